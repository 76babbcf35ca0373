// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Property tests over random reserve/release sequences on uniform chips.

use std::sync::Arc;

use proptest::prelude::*;

use super::*;
use crate::BlockKind;
use crate::catalog::Catalog;
use crate::config::PeerSearch;
use crate::pool::HwPool;
use crate::testing::{UniformCatalogSetupBuilder, consumer, legacy_catalog};
use crate::topology::TopologyName;

const TOPOLOGIES: [TopologyName; 7] = [
    TopologyName::None,
    TopologyName::SinglePipe,
    TopologyName::SinglePipeDsc,
    TopologyName::DualPipe,
    TopologyName::DualPipeDsc,
    TopologyName::DualPipe3DMerge,
    TopologyName::QuadPipe3DMerge,
];

#[derive(Debug, Clone)]
enum Op {
    Reserve { enc: u32, topology: TopologyName },
    Release { enc: u32 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1u32..=4, proptest::sample::select(TOPOLOGIES.to_vec()))
            .prop_map(|(enc, topology)| Op::Reserve { enc, topology }),
        1 => (1u32..=4).prop_map(|enc| Op::Release { enc }),
    ]
}

fn policy() -> impl Strategy<Value = PeerSearch> {
    prop_oneof![Just(PeerSearch::Narrow), Just(PeerSearch::Exhaustive)]
}

struct World {
    state: ReservationState,
    table: TopologyTable,
    config: RmConfig,
}

impl World {
    fn new(mixers: u32, split_ctls: u32, peer_search: PeerSearch) -> Self {
        let catalog = UniformCatalogSetupBuilder::default()
            .mixers(mixers)
            .split_ctls(split_ctls)
            .build()
            .unwrap()
            .catalog();
        Self::with_catalog(catalog, peer_search)
    }

    fn with_catalog(catalog: Catalog, peer_search: PeerSearch) -> Self {
        let table = TopologyTable::for_version(catalog.ctl_version());
        let state = HwPool::new(Arc::new(catalog)).unwrap().snapshot();
        let config = RmConfig::builder().peer_search(peer_search).build().unwrap();
        Self {
            state,
            table,
            config,
        }
    }

    /// Each encoder drives its own pair of interfaces.
    fn reqs(&self, enc: u32, topology: TopologyName) -> ReservationRequirements {
        let num_intf = self.table.def(topology).num_intf;
        let first = 2 * (enc - 1);
        let hw = HwResources::intfs((first..first + 2).take(num_intf as usize));
        ReservationRequirements::for_topology(topology, hw, TopologyControl::empty(), &self.table)
    }

    fn reserve(&mut self, enc: u32, topology: TopologyName) -> Result<Assignment> {
        let reqs = self.reqs(enc, topology);
        reserve(&mut self.state, &self.table, &self.config, consumer(enc), &reqs, None)
    }

    fn reserve_legacy(&mut self, enc: u32, request: usize) -> Result<Assignment> {
        let (topology, hw, controls) = legacy_request(request);
        let reqs = ReservationRequirements::for_topology(topology, hw, controls, &self.table);
        reserve(&mut self.state, &self.table, &self.config, consumer(enc), &reqs, None)
    }
}

/// Requests on the legacy chip that pull in companions beyond mixers and
/// CTLs: the split slave pingpong, CDM through an interface or a writeback,
/// CWB mixers and paired DSCs.
fn legacy_request(index: usize) -> (TopologyName, HwResources, TopologyControl) {
    match index % 5 {
        0 => (
            TopologyName::PpSplit,
            HwResources::intfs([0, 1]).primary().with_cdm(),
            TopologyControl::DSPP | TopologyControl::DS,
        ),
        1 => (
            TopologyName::SinglePipe,
            HwResources::intfs([1]).with_cdm(),
            TopologyControl::empty(),
        ),
        2 => (
            TopologyName::SinglePipe,
            HwResources::default().wbs([2]).with_cdm(),
            TopologyControl::empty(),
        ),
        3 => (
            TopologyName::DualPipe,
            HwResources::intfs([2]),
            TopologyControl::CWB,
        ),
        _ => (
            TopologyName::DualPipeDsc,
            HwResources::intfs([0]),
            TopologyControl::DSPP,
        ),
    }
}

fn check_assignment(world: &World, enc: u32, topology: TopologyName, got: &Assignment) {
    let def = world.table.def(topology);
    assert_eq!(got.lms.len(), def.num_lm as usize);
    assert_eq!(got.ctls.len(), def.num_ctl as usize);
    assert_eq!(got.dscs.len(), def.num_enc as usize);

    let owner = Some(consumer(enc));
    for &lm in &got.lms {
        assert_eq!(world.state.owner(BlockKind::Lm, lm), owner);
        assert_eq!(world.state.owner(BlockKind::Pingpong, lm), owner);
    }
    for &ctl in &got.ctls {
        assert_eq!(world.state.owner(BlockKind::Ctl, ctl), owner);
    }
    for &dsc in &got.dscs {
        assert_eq!(world.state.owner(BlockKind::Dsc, dsc), owner);
    }

    if let Some((&primary, rest)) = got.lms.split_first() {
        let peers = world.state.catalog().lm(primary).map(|lm| lm.peers).unwrap_or_default();
        assert!(rest.iter().all(|&lm| peers.contains(lm)));
    }
    assert_eq!(world.state.owned_by(consumer(enc), BlockKind::Lm).count(), got.lms.len());
}

proptest! {
    #[test]
    fn prop_reservations_are_all_or_nothing(
        mixers in 4u32..=8,
        split_ctls in 0u32..=2,
        peer_search in policy(),
        ops in proptest::collection::vec(op(), 1..24),
    ) {
        let mut world = World::new(mixers, split_ctls, peer_search);

        for op in ops {
            match op {
                Op::Reserve { enc, topology } => {
                    let before = world.state.clone();
                    match world.reserve(enc, topology) {
                        Ok(got) => {
                            check_assignment(&world, enc, topology, &got);
                            prop_assert_eq!(world.state.topology_for(consumer(enc)), Some(topology));
                        }
                        Err(_) => prop_assert!(world.state.same_reservations(&before)),
                    }
                }
                Op::Release { enc } => {
                    world.state.release(consumer(enc));
                }
            }

            // Every pool entry has at most one owner and every owner has a
            // topology on record.
            let consumers = world.state.consumers();
            for &c in &consumers {
                prop_assert!(world.state.topology_for(c).is_some());
            }
            let masks: Vec<_> = consumers.iter().map(|&c| world.state.mask_for(c)).collect();
            for (i, a) in masks.iter().enumerate() {
                for b in &masks[i + 1..] {
                    prop_assert!(!a.intersects(*b));
                }
            }
        }
    }

    #[test]
    fn prop_repeat_reservation_is_idempotent(
        mixers in 4u32..=8,
        peer_search in policy(),
        setup in proptest::collection::vec(op(), 0..12),
        enc in 1u32..=4,
        topology in proptest::sample::select(TOPOLOGIES.to_vec()),
    ) {
        let mut world = World::new(mixers, 1, peer_search);
        for op in setup {
            match op {
                Op::Reserve { enc, topology } => {
                    let _ = world.reserve(enc, topology);
                }
                Op::Release { enc } => {
                    world.state.release(consumer(enc));
                }
            }
        }

        if let Ok(first) = world.reserve(enc, topology) {
            let after_first = world.state.clone();
            let second = world.reserve(enc, topology);
            prop_assert_eq!(second.ok(), Some(first));
            prop_assert!(world.state.same_reservations(&after_first));
        }
    }

    #[test]
    fn prop_release_only_frees_the_consumer(
        mixers in 4u32..=8,
        ops in proptest::collection::vec(op(), 1..16),
        enc in 1u32..=4,
    ) {
        let mut world = World::new(mixers, 1, PeerSearch::Narrow);
        for op in ops {
            if let Op::Reserve { enc, topology } = op {
                let _ = world.reserve(enc, topology);
            }
        }

        let before = world.state.clone();
        world.state.release(consumer(enc));

        prop_assert!(world.state.mask_for(consumer(enc)).is_empty());
        prop_assert_eq!(world.state.topology_for(consumer(enc)), None);
        for other in before.consumers().into_iter().filter(|&c| c != consumer(enc)) {
            prop_assert_eq!(world.state.blocks_for(other), before.blocks_for(other));
        }
    }

    #[test]
    fn prop_release_restores_prior_state(
        qdss in 0u32..=2,
        peer_search in policy(),
        setup in proptest::collection::vec(op(), 0..12),
        topology in proptest::sample::select(TOPOLOGIES.to_vec()),
    ) {
        let catalog = UniformCatalogSetupBuilder::default()
            .mixers(8)
            .split_ctls(2)
            .qdss(qdss)
            .build()
            .unwrap()
            .catalog();
        let mut world = World::with_catalog(catalog, peer_search);
        // Background consumers stay on encoders 1..=3.
        for op in setup {
            match op {
                Op::Reserve { enc, topology } if enc < 4 => {
                    let _ = world.reserve(enc, topology);
                }
                Op::Release { enc } => {
                    world.state.release(consumer(enc));
                }
                Op::Reserve { .. } => {}
            }
        }

        let before = world.state.clone();
        if world.reserve(4, topology).is_ok() {
            if qdss > 0 {
                prop_assert_eq!(world.state.owned_by(consumer(4), BlockKind::Qdss).count(), 1);
            }
            world.state.release(consumer(4));
        }
        prop_assert!(world.state.same_reservations(&before));
        prop_assert_eq!(world.state.topology_for(consumer(4)), None);
    }

    #[test]
    fn prop_release_restores_prior_state_with_companions(
        background in proptest::option::of(0usize..5),
        request in 0usize..5,
    ) {
        let mut world = World::with_catalog(legacy_catalog(), PeerSearch::Narrow);
        if let Some(index) = background {
            let _ = world.reserve_legacy(2, index);
        }

        let before = world.state.clone();
        if world.reserve_legacy(1, request).is_ok() {
            world.state.release(consumer(1));
        }
        prop_assert!(world.state.same_reservations(&before));
    }
}
