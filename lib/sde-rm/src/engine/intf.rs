// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Interfaces, writebacks and the chroma down mux feeding them.

use super::Context;
use super::search::UndoLog;
use crate::error::{Result, RmError, Stage};
use crate::pool::ReservationState;
use crate::{BlockId, BlockKind};

/// Step 3: the encoder's fixed INTF and WB ids, then a CDM if needed.
///
/// The ids were wired at probe time, so a missing or foreign-owned one is an
/// inconsistency rather than a shortage.
pub(crate) fn reserve_intfs(
    ctx: &Context<'_>,
    state: &mut ReservationState,
    undo: &mut UndoLog,
) -> Result<()> {
    let hw = ctx.reqs.hw();
    for (kind, ids) in [(BlockKind::Intf, &hw.intfs), (BlockKind::Wb, &hw.wbs)] {
        for &id in ids {
            let pos = state.position(kind, id).ok_or_else(|| {
                RmError::InternalInconsistency(format!(
                    "{} wants {kind} {id}, which the pool lacks",
                    ctx.consumer
                ))
            })?;
            if let Some(owner) = state.entry_at(pos).reserved_by()
                && owner != ctx.consumer
            {
                return Err(RmError::InternalInconsistency(format!(
                    "{kind} {id} is fixed to {} but held by {owner}",
                    ctx.consumer
                )));
            }
            undo.claim(state, pos, ctx.consumer);
        }
    }

    if hw.needs_cdm {
        reserve_cdm(ctx, state, undo, &hw.intfs, &hw.wbs)?;
    }
    Ok(())
}

fn reserve_cdm(
    ctx: &Context<'_>,
    state: &mut ReservationState,
    undo: &mut UndoLog,
    intfs: &[BlockId],
    wbs: &[BlockId],
) -> Result<()> {
    for id in ctx.catalog.ids(BlockKind::Cdm) {
        let Some(cdm) = ctx.catalog.cdm(id) else {
            continue;
        };
        let reaches = intfs.iter().any(|&i| cdm.intfs.contains(i))
            || wbs.iter().any(|&w| cdm.wbs.contains(w));
        if !reaches {
            tracing::debug!(consumer = %ctx.consumer, cdm = id, "cdm does not reach encoder outputs");
            continue;
        }
        if let Some(pos) = state.position(BlockKind::Cdm, id)
            && state.is_available(pos, ctx.consumer)
        {
            undo.claim(state, pos, ctx.consumer);
            return Ok(());
        }
    }

    Err(ctx.unsatisfiable(Stage::Cdm))
}
