// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Control paths.

use super::search::UndoLog;
use super::{Context, TopologyControl};
use crate::catalog::{CtlCaps, CtlFeatures};
use crate::error::{Result, Stage};
use crate::pool::ReservationState;
use crate::topology::TopologyName;
use crate::{BlockId, BlockKind};

/// Step 2: `num_ctl` control paths whose split-display support matches.
///
/// The first pass uses the topology's split requirement (forced on by
/// `FORCE_SPLIT_CTL`); if that fails and relaxation is enabled, one more pass
/// accepts only split-capable CTLs.
pub(crate) fn reserve_ctls(
    ctx: &Context<'_>,
    state: &mut ReservationState,
    undo: &mut UndoLog,
) -> Result<Vec<BlockId>> {
    let count = ctx.topology().num_ctl as usize;
    if count == 0 {
        return Ok(Vec::new());
    }

    let split =
        ctx.topology().needs_split_display || ctx.reqs.wants(TopologyControl::FORCE_SPLIT_CTL);
    let mut passes = vec![split];
    if !split && ctx.config.ctl_split_relaxation {
        passes.push(true);
    }

    for split in passes {
        let Some(positions) = pick(ctx, state, count, split) else {
            tracing::debug!(consumer = %ctx.consumer, split, "ctl pass failed");
            continue;
        };

        let mut ids = Vec::with_capacity(count);
        for pos in positions {
            ids.push(state.entry_at(pos).id());
            undo.claim(state, pos, ctx.consumer);
        }
        return Ok(ids);
    }

    Err(ctx.unsatisfiable(Stage::Ctl))
}

fn eligible(
    ctx: &Context<'_>,
    ctl: &CtlCaps,
    split: bool,
) -> std::result::Result<(), &'static str> {
    let bypass_split = ctl.features.contains(CtlFeatures::PRIMARY_PREF)
        && (ctx.is_pinned() || ctx.reqs.hw().is_primary);

    if !bypass_split && ctl.features.contains(CtlFeatures::SPLIT_DISPLAY) != split {
        return Err("split display does not match");
    }
    if ctx.topology().name == TopologyName::PpSplit
        && !ctl.features.contains(CtlFeatures::PINGPONG_SPLIT)
    {
        return Err("no pingpong split support");
    }
    Ok(())
}

/// Pool positions of `count` eligible CTLs, without claiming them.
fn pick(
    ctx: &Context<'_>,
    state: &ReservationState,
    count: usize,
    split: bool,
) -> Option<Vec<usize>> {
    let pinned = ctx.pinned.map(|p| p.ctls.as_slice());
    let candidates: Vec<BlockId> = match pinned {
        Some(pins) if pins.len() < count => return None,
        Some(pins) => pins[..count].to_vec(),
        None => ctx.catalog.ids(BlockKind::Ctl).collect(),
    };

    let mut picks = Vec::with_capacity(count);
    for id in candidates {
        let verdict = match (ctx.catalog.ctl(id), state.position(BlockKind::Ctl, id)) {
            (Some(ctl), Some(pos)) if state.is_available(pos, ctx.consumer) => {
                eligible(ctx, ctl, split).map(|()| pos)
            }
            (Some(_), Some(_)) => Err("reserved by another consumer"),
            _ => Err("not in catalog"),
        };

        match verdict {
            Ok(pos) => {
                picks.push(pos);
                if picks.len() == count {
                    return Some(picks);
                }
            }
            Err(reason) => {
                tracing::debug!(consumer = %ctx.consumer, ctl = id, split, reason, "ctl rejected");
                // Pinned ids must all match.
                if pinned.is_some() {
                    return None;
                }
            }
        }
    }
    None
}
