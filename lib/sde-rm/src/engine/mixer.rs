// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Layer mixers and their hardwired companions.
//!
//! A mixer is only usable together with its pingpong and, depending on the
//! request and its slot in the assignment, its DSPP, destination scaler,
//! ROI-MISR and shared DSC. Every companion must be free or already held by
//! the consumer; a busy companion disqualifies the mixer, not the search.

use super::search::{Picker, UndoLog, search};
use super::{Context, TopologyControl};
use crate::catalog::{IdMask, LmCaps, PingpongFeatures};
use crate::error::{Result, Stage};
use crate::pool::ReservationState;
use crate::topology::TopologyName;
use crate::{BlockId, BlockKind};

/// How a mixer's optional companion must match the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompanionMatch {
    /// Requested: the mixer must have it, and it is reserved.
    Required,
    /// Not requested: the mixer must not have it.
    Forbidden,
    /// Not requested, but a mixer that has it is acceptable.
    Either,
}

impl CompanionMatch {
    fn requested(wanted: bool) -> Self {
        if wanted {
            CompanionMatch::Required
        } else {
            CompanionMatch::Forbidden
        }
    }

    fn relaxed(self) -> Self {
        match self {
            CompanionMatch::Forbidden => CompanionMatch::Either,
            other => other,
        }
    }

    fn accepts(self, present: bool) -> bool {
        match self {
            CompanionMatch::Required => present,
            CompanionMatch::Forbidden => !present,
            CompanionMatch::Either => true,
        }
    }
}

/// Mixers chosen for a consumer, in slot order.
#[derive(Debug, Default)]
pub(crate) struct MixerPicks {
    pub lms: Vec<BlockId>,
    /// DSC encoders reserved with the mixers on shared ROI-MISR/DSC hardware.
    pub dscs: Vec<BlockId>,
}

struct MixerPicker<'a, 'c> {
    ctx: &'a Context<'c>,
    dspp: CompanionMatch,
    ds: CompanionMatch,
}

impl MixerPicker<'_, '_> {
    /// Only the even mixers of a 3D-merge pair sit on the active post-blend
    /// path.
    fn on_post_blend_path(&self, slot: usize) -> bool {
        !(self.ctx.topology().is_3d_merge() && slot % 2 == 1)
    }

    fn wants_roi_misr(&self, slot: usize) -> bool {
        let name = self.ctx.topology().name;
        self.ctx.table.num_dsc_or_misr_blocks_for(name, true) > 0 && self.on_post_blend_path(slot)
    }

    fn wants_shared_dsc(&self, slot: usize) -> bool {
        shares_dsc(self.ctx) && self.on_post_blend_path(slot)
    }

    fn claimable(
        &self,
        state: &ReservationState,
        kind: BlockKind,
        id: BlockId,
    ) -> std::result::Result<usize, &'static str> {
        let pos = state.position(kind, id).ok_or("companion missing from pool")?;
        if !state.is_available(pos, self.ctx.consumer) {
            return Err("companion reserved by another consumer");
        }
        Ok(pos)
    }

    /// Pool positions to claim for `lm` in `slot`, or why it is ineligible.
    fn check(
        &self,
        state: &ReservationState,
        lm: &LmCaps,
        slot: usize,
    ) -> std::result::Result<Vec<usize>, &'static str> {
        let ctx = self.ctx;
        let mut claims = Vec::with_capacity(6);

        claims.push(self.claimable(state, BlockKind::Lm, lm.id)?);

        if lm.is_primary_pref() && !ctx.reqs.hw().is_primary && !ctx.is_pinned() {
            return Err("reserved for the primary display");
        }
        if ctx.reqs.wants(TopologyControl::CWB) && !lm.is_cwb_pref() {
            return Err("no concurrent writeback support");
        }
        if !self.dspp.accepts(lm.dspp.is_some()) {
            return Err("dspp does not match request");
        }
        if !self.ds.accepts(lm.ds.is_some()) {
            return Err("dest scaler does not match request");
        }

        claims.push(self.claimable(state, BlockKind::Pingpong, lm.pingpong)?);
        if ctx.topology().name == TopologyName::PpSplit {
            let split = ctx
                .catalog
                .pingpong(lm.pingpong)
                .is_some_and(|pp| pp.features.contains(PingpongFeatures::SPLIT));
            if !split {
                return Err("pingpong cannot split");
            }
        }

        if self.dspp == CompanionMatch::Required
            && let Some(dspp) = lm.dspp
        {
            claims.push(self.claimable(state, BlockKind::Dspp, dspp)?);
        }
        if self.ds == CompanionMatch::Required
            && let Some(ds) = lm.ds
        {
            claims.push(self.claimable(state, BlockKind::Ds, ds)?);
        }

        if self.wants_roi_misr(slot)
            && ctx.catalog.has_roi_misr()
            && let Some(misr) = lm.roi_misr
        {
            claims.push(self.claimable(state, BlockKind::RoiMisr, misr)?);
        }

        if self.wants_shared_dsc(slot) {
            let dsc = lm.roi_misr.ok_or("no dsc on the roi-misr path")?;
            if let Some(pinned) = ctx.pinned {
                // Pinned DSCs pair with the post-blend slots in order.
                let index = (0..slot).filter(|&s| self.on_post_blend_path(s)).count();
                match pinned.dscs.get(index) {
                    None => return Err("too few pinned dsc ids"),
                    Some(&expected) if expected != dsc => {
                        return Err("dsc does not match pinned id");
                    }
                    Some(_) => {}
                }
            }
            claims.push(self.claimable(state, BlockKind::Dsc, dsc)?);
        }

        Ok(claims)
    }
}

impl Picker for MixerPicker<'_, '_> {
    fn candidates(&self) -> Vec<BlockId> {
        self.ctx.catalog.ids(BlockKind::Lm).collect()
    }

    fn peers_of(&self, id: BlockId) -> IdMask {
        self.ctx
            .catalog
            .lm(id)
            .map(|lm| lm.peers)
            .unwrap_or(IdMask::EMPTY)
    }

    fn try_pick(
        &self,
        state: &mut ReservationState,
        undo: &mut UndoLog,
        id: BlockId,
        slot: usize,
    ) -> bool {
        let Some(lm) = self.ctx.catalog.lm(id) else {
            tracing::debug!(lm = id, "mixer not in catalog");
            return false;
        };

        match self.check(state, lm, slot) {
            Ok(claims) => {
                for pos in claims {
                    undo.claim(state, pos, self.ctx.consumer);
                }
                true
            }
            Err(reason) => {
                tracing::debug!(consumer = %self.ctx.consumer, lm = id, slot, reason, "mixer rejected");
                false
            }
        }
    }
}

fn shares_dsc(ctx: &Context<'_>) -> bool {
    ctx.catalog.roi_misr_dsc_shared() && ctx.topology().num_enc > 0
}

/// Step 1: mixers with companions, relaxing the DSPP and DS match if allowed.
pub(crate) fn reserve_mixers(
    ctx: &Context<'_>,
    state: &mut ReservationState,
    undo: &mut UndoLog,
) -> Result<MixerPicks> {
    let count = ctx.topology().num_lm as usize;
    if count == 0 {
        return Ok(MixerPicks::default());
    }

    let dspp = CompanionMatch::requested(ctx.reqs.wants(TopologyControl::DSPP));
    let ds = CompanionMatch::requested(ctx.reqs.wants(TopologyControl::DS));
    let mut passes = vec![(dspp, ds)];
    if ctx.config.lm_relaxation {
        for pass in [(dspp.relaxed(), ds), (dspp.relaxed(), ds.relaxed())] {
            if !passes.contains(&pass) {
                passes.push(pass);
            }
        }
    }

    let pinned = ctx.pinned.map(|p| p.lms.as_slice());
    for (pass, &(dspp, ds)) in passes.iter().enumerate() {
        let picker = MixerPicker { ctx, dspp, ds };
        let Some(lms) = search(&picker, state, undo, count, ctx.config.peer_search, pinned) else {
            continue;
        };

        if pass > 0 {
            tracing::debug!(consumer = %ctx.consumer, pass, ?dspp, ?ds, "mixers reserved after relaxation");
        }

        let dscs = lms
            .iter()
            .enumerate()
            .filter(|&(slot, _)| picker.wants_shared_dsc(slot))
            .filter_map(|(_, &id)| ctx.catalog.lm(id).and_then(|lm| lm.roi_misr))
            .collect();
        return Ok(MixerPicks { lms, dscs });
    }

    Err(ctx.unsatisfiable(Stage::Mixers))
}

/// Step 1b: the slave half of a ping-pong split.
pub(crate) fn reserve_pingpong_slave(
    ctx: &Context<'_>,
    state: &mut ReservationState,
    undo: &mut UndoLog,
    lms: &[BlockId],
) -> Result<()> {
    if ctx.topology().name != TopologyName::PpSplit {
        return Ok(());
    }

    let masters: Vec<BlockId> = lms
        .iter()
        .filter_map(|&id| ctx.catalog.lm(id))
        .map(|lm| lm.pingpong)
        .collect();

    for id in ctx.catalog.ids(BlockKind::Pingpong) {
        if masters.contains(&id) {
            continue;
        }
        let slave = ctx
            .catalog
            .pingpong(id)
            .is_some_and(|pp| pp.features.contains(PingpongFeatures::SLAVE));
        if !slave {
            continue;
        }
        if let Some(pos) = state.position(BlockKind::Pingpong, id)
            && state.is_available(pos, ctx.consumer)
        {
            undo.claim(state, pos, ctx.consumer);
            return Ok(());
        }
    }

    Err(ctx.unsatisfiable(Stage::PingpongSlave))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_match() {
        use CompanionMatch::*;

        assert!(Required.accepts(true) && !Required.accepts(false));
        assert!(Forbidden.accepts(false) && !Forbidden.accepts(true));
        assert!(Either.accepts(true) && Either.accepts(false));

        assert_eq!(Forbidden.relaxed(), Either);
        assert_eq!(Required.relaxed(), Required);
        assert_eq!(CompanionMatch::requested(true), Required);
    }
}
