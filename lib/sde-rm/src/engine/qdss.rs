// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use super::Context;
use super::search::UndoLog;
use crate::BlockKind;
use crate::error::{Result, Stage};
use crate::pool::ReservationState;

/// Step 5: first available QDSS, if the chip has any.
pub(crate) fn reserve_qdss(
    ctx: &Context<'_>,
    state: &mut ReservationState,
    undo: &mut UndoLog,
) -> Result<()> {
    if ctx.catalog.block_count(BlockKind::Qdss) == 0 {
        return Ok(());
    }

    let free = state
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| e.kind() == BlockKind::Qdss)
        .map(|(pos, _)| pos)
        .find(|&pos| state.is_available(pos, ctx.consumer));

    match free {
        Some(pos) => {
            undo.claim(state, pos, ctx.consumer);
            Ok(())
        }
        None => Err(ctx.unsatisfiable(Stage::Qdss)),
    }
}
