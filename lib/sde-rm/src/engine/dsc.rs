// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Compression encoders on hardware with a dedicated DSC id space.

use super::Context;
use super::search::{Picker, UndoLog, search};
use crate::catalog::IdMask;
use crate::error::{Result, Stage};
use crate::pool::ReservationState;
use crate::{BlockId, BlockKind};

struct DscPicker<'a, 'c> {
    ctx: &'a Context<'c>,
}

impl Picker for DscPicker<'_, '_> {
    fn candidates(&self) -> Vec<BlockId> {
        self.ctx.catalog.ids(BlockKind::Dsc).collect()
    }

    fn peers_of(&self, id: BlockId) -> IdMask {
        self.ctx
            .catalog
            .dsc(id)
            .map(|dsc| dsc.peers)
            .unwrap_or(IdMask::EMPTY)
    }

    fn try_pick(
        &self,
        state: &mut ReservationState,
        undo: &mut UndoLog,
        id: BlockId,
        _slot: usize,
    ) -> bool {
        match state.position(BlockKind::Dsc, id) {
            Some(pos) if state.is_available(pos, self.ctx.consumer) => {
                undo.claim(state, pos, self.ctx.consumer);
                true
            }
            _ => {
                tracing::debug!(consumer = %self.ctx.consumer, dsc = id, "dsc unavailable");
                false
            }
        }
    }
}

/// Step 4: `num_enc` paired encoders. Skipped where DSCs were reserved with
/// the mixers.
pub(crate) fn reserve_dscs(
    ctx: &Context<'_>,
    state: &mut ReservationState,
    undo: &mut UndoLog,
) -> Result<Vec<BlockId>> {
    let count = ctx.topology().num_enc as usize;
    if ctx.catalog.roi_misr_dsc_shared() || count == 0 {
        return Ok(Vec::new());
    }

    let pinned = ctx.pinned.map(|p| p.dscs.as_slice());
    search(&DscPicker { ctx }, state, undo, count, ctx.config.peer_search, pinned)
        .ok_or_else(|| ctx.unsatisfiable(Stage::Dsc))
}
