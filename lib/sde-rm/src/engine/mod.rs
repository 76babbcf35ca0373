// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Reservation engine.
//!
//! [`reserve`] marks every block a topology needs as held by one consumer in
//! a trial [`ReservationState`]. The steps run in a fixed order:
//!
//! 1. layer mixers with their companions (and the slave pingpong of a
//!    ping-pong split)
//! 2. control paths
//! 3. the encoder's fixed INTF and WB blocks, then a CDM
//! 4. DSC encoders, unless they share the ROI-MISR id space
//! 5. QDSS
//!
//! A failing step leaves the state exactly as it was before the call.
//! Blocks the consumer already holds count as available, so reserving the
//! same requirements twice yields the same blocks. Blocks it held that the
//! new reservation does not use are freed.

mod ctl;
mod dsc;
mod intf;
mod mixer;
mod qdss;
mod requirements;
mod search;

pub use requirements::{
    HwResources, PinnedIds, PipelineShape, ReservationRequirements, TopologyControl,
};

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::config::RmConfig;
use crate::error::{Result, RmError, Stage};
use crate::pool::ReservationState;
use crate::topology::{TopologyDef, TopologyTable};
use crate::{BlockId, ConsumerId};

use search::UndoLog;

/// Searched blocks chosen for one consumer, in assignment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub lms: Vec<BlockId>,
    pub ctls: Vec<BlockId>,
    pub dscs: Vec<BlockId>,
}

/// Inputs shared by every step of one attempt.
pub(crate) struct Context<'a> {
    pub catalog: &'a Catalog,
    pub table: &'a TopologyTable,
    pub config: &'a RmConfig,
    pub consumer: ConsumerId,
    pub reqs: &'a ReservationRequirements,
    pub pinned: Option<&'a PinnedIds>,
}

impl Context<'_> {
    pub fn topology(&self) -> &TopologyDef {
        self.reqs.topology()
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some()
    }

    pub fn unsatisfiable(&self, stage: Stage) -> RmError {
        RmError::Unsatisfiable {
            consumer: self.consumer,
            stage,
            topology: self.topology().name,
        }
    }
}

/// Reserve everything `reqs` needs for `consumer` in `state`.
///
/// With `pinned`, mixers, CTLs and DSCs must be exactly the given ids, in
/// order; primary-display preferences are not enforced.
pub fn reserve(
    state: &mut ReservationState,
    table: &TopologyTable,
    config: &RmConfig,
    consumer: ConsumerId,
    reqs: &ReservationRequirements,
    pinned: Option<&PinnedIds>,
) -> Result<Assignment> {
    let catalog = Arc::clone(state.catalog());
    let ctx = Context {
        catalog: &catalog,
        table,
        config,
        consumer,
        reqs,
        pinned,
    };

    let mut undo = UndoLog::default();
    match run_steps(&ctx, state, &mut undo) {
        Ok(assignment) => {
            release_untouched(state, consumer, &undo);
            state.set_topology(consumer, ctx.topology().name);
            tracing::debug!(
                %consumer,
                topology = %ctx.topology().name,
                pinned = ctx.is_pinned(),
                ?assignment,
                "reservation complete"
            );
            Ok(assignment)
        }
        Err(err) => {
            undo.rollback(state, 0);
            tracing::debug!(%consumer, topology = %ctx.topology().name, error = %err, "reservation failed");
            Err(err)
        }
    }
}

fn run_steps(
    ctx: &Context<'_>,
    state: &mut ReservationState,
    undo: &mut UndoLog,
) -> Result<Assignment> {
    let mixers = mixer::reserve_mixers(ctx, state, undo)?;
    mixer::reserve_pingpong_slave(ctx, state, undo, &mixers.lms)?;
    let ctls = ctl::reserve_ctls(ctx, state, undo)?;
    intf::reserve_intfs(ctx, state, undo)?;
    let mut dscs = dsc::reserve_dscs(ctx, state, undo)?;
    qdss::reserve_qdss(ctx, state, undo)?;

    if dscs.is_empty() {
        dscs = mixers.dscs;
    }
    Ok(Assignment {
        lms: mixers.lms,
        ctls,
        dscs,
    })
}

/// Free pool blocks the consumer held before this attempt but no longer
/// uses. External blocks stay until the consumer is released.
fn release_untouched(state: &mut ReservationState, consumer: ConsumerId, undo: &UndoLog) {
    let touched: HashSet<usize> = undo.touched().collect();
    let stale: Vec<usize> = state
        .entries()
        .iter()
        .enumerate()
        .filter(|(pos, e)| {
            e.reserved_by() == Some(consumer) && !e.is_external() && !touched.contains(pos)
        })
        .map(|(pos, _)| pos)
        .collect();

    for pos in stale {
        let entry = state.entry_at(pos);
        tracing::trace!(%consumer, kind = %entry.kind(), id = entry.id(), "freeing block left from previous reservation");
        state.set_owner(pos, None);
    }
}

#[cfg(test)]
mod tests;

#[cfg(test)]
mod proptests;
