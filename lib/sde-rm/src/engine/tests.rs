// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::catalog::Catalog;
use crate::config::PeerSearch;
use crate::pool::HwPool;
use crate::testing::{
    UniformCatalogSetupBuilder, consumer, legacy_catalog, quad_misr_catalog, two_mixer_catalog,
};
use crate::topology::TopologyName;
use crate::BlockKind;

/// Trial state plus everything [`reserve`] needs next to it.
struct Harness {
    state: ReservationState,
    table: TopologyTable,
    config: RmConfig,
}

impl Harness {
    fn new(catalog: Catalog) -> Self {
        Self::with_config(catalog, RmConfig::default())
    }

    fn with_config(catalog: Catalog, config: RmConfig) -> Self {
        let table = TopologyTable::for_version(catalog.ctl_version());
        let pool = HwPool::new(Arc::new(catalog)).expect("pool");
        Self {
            state: pool.snapshot(),
            table,
            config,
        }
    }

    fn reqs(
        &self,
        name: TopologyName,
        hw: HwResources,
        controls: TopologyControl,
    ) -> ReservationRequirements {
        ReservationRequirements::for_topology(name, hw, controls, &self.table)
    }

    fn reserve(
        &mut self,
        enc: u32,
        name: TopologyName,
        hw: HwResources,
        controls: TopologyControl,
    ) -> Result<Assignment> {
        let reqs = self.reqs(name, hw, controls);
        reserve(&mut self.state, &self.table, &self.config, consumer(enc), &reqs, None)
    }

    fn reserve_pinned(
        &mut self,
        enc: u32,
        name: TopologyName,
        hw: HwResources,
        pinned: &PinnedIds,
    ) -> Result<Assignment> {
        let reqs = self.reqs(name, hw, TopologyControl::empty());
        reserve(
            &mut self.state,
            &self.table,
            &self.config,
            consumer(enc),
            &reqs,
            Some(pinned),
        )
    }

    fn owned(&self, enc: u32, kind: BlockKind) -> Vec<BlockId> {
        self.state.owned_by(consumer(enc), kind).map(|b| b.id).collect()
    }
}

fn assignment(lms: &[BlockId], ctls: &[BlockId], dscs: &[BlockId]) -> Assignment {
    Assignment {
        lms: lms.to_vec(),
        ctls: ctls.to_vec(),
        dscs: dscs.to_vec(),
    }
}

fn unsatisfiable_at(result: Result<Assignment>) -> Stage {
    match result {
        Err(RmError::Unsatisfiable { stage, .. }) => stage,
        other => panic!("expected an unsatisfiable reservation, got {other:?}"),
    }
}

#[test]
fn test_dual_pipe_dsc_takes_every_companion() {
    let mut h = Harness::new(two_mixer_catalog());

    let got = h
        .reserve(1, TopologyName::DualPipeDsc, HwResources::intfs([1, 2]), TopologyControl::DSPP)
        .unwrap();

    assert_eq!(got, assignment(&[0, 1], &[0], &[0, 1]));
    assert_eq!(h.owned(1, BlockKind::Dspp), vec![0, 1]);
    assert_eq!(h.owned(1, BlockKind::Pingpong), vec![0, 1]);
    assert_eq!(h.owned(1, BlockKind::Intf), vec![1, 2]);
    assert_eq!(h.state.blocks_for(consumer(1)).len(), 11);
    assert_eq!(h.state.topology_for(consumer(1)), Some(TopologyName::DualPipeDsc));
}

#[test]
fn test_second_single_pipe_relaxes_dspp_and_ctl_split() {
    let mut h = Harness::new(two_mixer_catalog());

    let first = h
        .reserve(1, TopologyName::SinglePipe, HwResources::intfs([1]), TopologyControl::empty())
        .unwrap();
    assert_eq!(first, assignment(&[0], &[1], &[]));
    // Relaxed mixers keep their DSPP free for someone who asks for it.
    assert!(h.owned(1, BlockKind::Dspp).is_empty());

    let second = h
        .reserve(2, TopologyName::SinglePipe, HwResources::intfs([2]), TopologyControl::empty())
        .unwrap();
    assert_eq!(second, assignment(&[1], &[0], &[]));
}

#[test]
fn test_relaxation_can_be_disabled() {
    let no_lm = RmConfig::builder().lm_relaxation(false).build().unwrap();
    let mut h = Harness::with_config(two_mixer_catalog(), no_lm);
    let result = h.reserve(
        1,
        TopologyName::SinglePipe,
        HwResources::intfs([1]),
        TopologyControl::empty(),
    );
    assert_eq!(unsatisfiable_at(result), Stage::Mixers);

    let no_split = RmConfig::builder().ctl_split_relaxation(false).build().unwrap();
    let mut h = Harness::with_config(two_mixer_catalog(), no_split);
    h.reserve(1, TopologyName::SinglePipe, HwResources::intfs([1]), TopologyControl::empty())
        .unwrap();
    let before = h.state.clone();
    let result = h.reserve(
        2,
        TopologyName::SinglePipe,
        HwResources::intfs([2]),
        TopologyControl::empty(),
    );
    assert_eq!(unsatisfiable_at(result), Stage::Ctl);
    assert!(h.state.same_reservations(&before));
}

#[test]
fn test_busy_split_ctl_fails_at_ctl_and_rolls_back() {
    let catalog = UniformCatalogSetupBuilder::default()
        .split_ctls(1)
        .build()
        .unwrap()
        .catalog();
    let mut h = Harness::new(catalog);

    let first = h
        .reserve(
            1,
            TopologyName::SinglePipe,
            HwResources::intfs([0]),
            TopologyControl::FORCE_SPLIT_CTL,
        )
        .unwrap();
    assert_eq!(first.ctls, vec![0]);

    let before = h.state.clone();
    let result = h.reserve(
        2,
        TopologyName::DualPipe,
        HwResources::intfs([2, 3]),
        TopologyControl::empty(),
    );
    assert_eq!(unsatisfiable_at(result), Stage::Ctl);
    assert!(h.state.same_reservations(&before));
    assert!(h.owned(2, BlockKind::Lm).is_empty());
}

#[test]
fn test_failure_on_mixers_leaves_state_unchanged() {
    let mut h = Harness::new(two_mixer_catalog());
    h.reserve(1, TopologyName::SinglePipe, HwResources::intfs([1]), TopologyControl::empty())
        .unwrap();

    let before = h.state.clone();
    let result = h.reserve(
        2,
        TopologyName::DualPipeDsc,
        HwResources::intfs([2]),
        TopologyControl::DSPP,
    );
    assert_eq!(unsatisfiable_at(result), Stage::Mixers);
    assert!(h.state.same_reservations(&before));
    assert_eq!(h.state.topology_for(consumer(2)), None);
}

#[test]
fn test_reserving_twice_is_idempotent() {
    let mut h = Harness::new(two_mixer_catalog());
    let hw = HwResources::intfs([1, 2]);

    let first = h
        .reserve(1, TopologyName::DualPipeDsc, hw.clone(), TopologyControl::DSPP)
        .unwrap();
    let after_first = h.state.clone();

    let second = h
        .reserve(1, TopologyName::DualPipeDsc, hw, TopologyControl::DSPP)
        .unwrap();
    assert_eq!(first, second);
    assert!(h.state.same_reservations(&after_first));
}

#[test]
fn test_new_reservation_replaces_the_old_one() {
    let mut h = Harness::new(two_mixer_catalog());
    h.reserve(1, TopologyName::DualPipeDsc, HwResources::intfs([1, 2]), TopologyControl::DSPP)
        .unwrap();

    let got = h
        .reserve(1, TopologyName::SinglePipe, HwResources::intfs([1]), TopologyControl::DSPP)
        .unwrap();
    assert_eq!(got, assignment(&[0], &[1], &[]));
    // Pool order groups blocks by kind.
    assert_eq!(
        h.state.blocks_for(consumer(1)),
        vec![
            (BlockKind::Lm, 0),
            (BlockKind::Dspp, 0),
            (BlockKind::Ctl, 1),
            (BlockKind::Pingpong, 0),
            (BlockKind::Intf, 1),
        ]
    );
    assert!(h.owned(1, BlockKind::Dsc).is_empty());
    assert_eq!(h.state.topology_for(consumer(1)), Some(TopologyName::SinglePipe));
}

#[test]
fn test_none_topology_reserves_nothing_and_frees_previous_blocks() {
    let mut h = Harness::new(two_mixer_catalog());
    h.reserve(1, TopologyName::SinglePipe, HwResources::intfs([1]), TopologyControl::empty())
        .unwrap();

    let got = h
        .reserve(1, TopologyName::None, HwResources::default(), TopologyControl::empty())
        .unwrap();
    assert_eq!(got, Assignment::default());
    assert_eq!(h.state.reserved_count(), 0);
}

#[test]
fn test_cwb_request_takes_cwb_mixers() {
    let mut h = Harness::new(legacy_catalog());

    let got = h
        .reserve(1, TopologyName::DualPipe3DMerge, HwResources::intfs([0]), TopologyControl::CWB)
        .unwrap();
    assert_eq!(got, assignment(&[2, 3], &[2], &[]));
}

#[rstest]
#[case::secondary(false, 1)]
#[case::primary(true, 0)]
fn test_primary_preferred_mixer(#[case] primary: bool, #[case] expected_lm: BlockId) {
    let mut h = Harness::new(legacy_catalog());
    let hw = if primary {
        HwResources::intfs([0]).primary()
    } else {
        HwResources::intfs([0])
    };

    let got = h
        .reserve(1, TopologyName::SinglePipe, hw, TopologyControl::DSPP)
        .unwrap();
    assert_eq!(got.lms, vec![expected_lm]);
    assert_eq!(got.ctls, vec![2]);
}

#[test]
fn test_pinned_mixer_ignores_primary_preference() {
    let mut h = Harness::new(legacy_catalog());
    let pinned = PinnedIds {
        lms: vec![0],
        ctls: vec![2],
        dscs: vec![],
    };

    let got = h
        .reserve_pinned(1, TopologyName::SinglePipe, HwResources::intfs([0]), &pinned)
        .unwrap();
    assert_eq!(got, assignment(&[0], &[2], &[]));
}

#[test]
fn test_primary_preferred_ctl_bypasses_split_check() {
    let mut h = Harness::new(legacy_catalog());
    // enc2 takes LM2 and the first split CTL.
    let other = h
        .reserve(
            2,
            TopologyName::SinglePipe,
            HwResources::intfs([2]),
            TopologyControl::FORCE_SPLIT_CTL,
        )
        .unwrap();
    assert_eq!(other, assignment(&[2], &[0], &[]));

    let got = h
        .reserve(
            1,
            TopologyName::DualPipe,
            HwResources::intfs([0, 1]).primary(),
            TopologyControl::empty(),
        )
        .unwrap();
    assert_eq!(got, assignment(&[0, 1], &[1, 3], &[]));
}

#[test]
fn test_pingpong_split_takes_slave_and_split_ctl() {
    let mut h = Harness::new(legacy_catalog());

    let got = h
        .reserve(
            1,
            TopologyName::PpSplit,
            HwResources::intfs([0, 1]).primary(),
            TopologyControl::DSPP | TopologyControl::DS,
        )
        .unwrap();
    assert_eq!(got, assignment(&[0], &[0], &[]));
    assert_eq!(h.owned(1, BlockKind::Pingpong), vec![0, 4]);
    assert_eq!(h.owned(1, BlockKind::Dspp), vec![0]);
    assert_eq!(h.owned(1, BlockKind::Ds), vec![0]);
}

#[test]
fn test_pingpong_split_needs_split_capable_pingpong() {
    let mut h = Harness::new(legacy_catalog());
    // Without the primary flag LM0, the only mixer on a splitting pingpong,
    // is off limits.
    let result = h.reserve(
        1,
        TopologyName::PpSplit,
        HwResources::intfs([0, 1]),
        TopologyControl::empty(),
    );
    assert_eq!(unsatisfiable_at(result), Stage::Mixers);
}

#[test]
fn test_cdm_must_reach_the_encoder() {
    let mut h = Harness::new(legacy_catalog());

    h.reserve(
        1,
        TopologyName::SinglePipe,
        HwResources::intfs([1]).with_cdm(),
        TopologyControl::empty(),
    )
        .unwrap();
    assert_eq!(h.owned(1, BlockKind::Cdm), vec![0]);

    let before = h.state.clone();
    let result = h.reserve(
        2,
        TopologyName::SinglePipe,
        HwResources::intfs([0]).with_cdm(),
        TopologyControl::empty(),
    );
    assert_eq!(unsatisfiable_at(result), Stage::Cdm);
    assert!(h.state.same_reservations(&before));
}

#[test]
fn test_cdm_reaches_writeback() {
    let mut h = Harness::new(legacy_catalog());

    h.reserve(
        1,
        TopologyName::SinglePipe,
        HwResources::default().wbs([2]).with_cdm(),
        TopologyControl::empty(),
    )
    .unwrap();
    assert_eq!(h.owned(1, BlockKind::Wb), vec![2]);
    assert_eq!(h.owned(1, BlockKind::Cdm), vec![0]);
}

#[rstest]
#[case::held_elsewhere(1)]
#[case::missing(7)]
fn test_fixed_interface_problems_are_inconsistencies(#[case] intf: BlockId) {
    let mut h = Harness::new(two_mixer_catalog());
    h.reserve(1, TopologyName::SinglePipe, HwResources::intfs([1]), TopologyControl::empty())
        .unwrap();

    let before = h.state.clone();
    let result = h.reserve(
        2,
        TopologyName::SinglePipe,
        HwResources::intfs([intf]),
        TopologyControl::empty(),
    );
    assert!(matches!(result, Err(RmError::InternalInconsistency(_))));
    assert!(h.state.same_reservations(&before));
}

#[test]
fn test_qdss_is_exclusive() {
    let catalog = UniformCatalogSetupBuilder::default()
        .qdss(1)
        .build()
        .unwrap()
        .catalog();
    let mut h = Harness::new(catalog);

    h.reserve(1, TopologyName::SinglePipe, HwResources::intfs([0]), TopologyControl::empty())
        .unwrap();
    assert_eq!(h.owned(1, BlockKind::Qdss), vec![0]);

    let result = h.reserve(
        2,
        TopologyName::SinglePipe,
        HwResources::intfs([1]),
        TopologyControl::empty(),
    );
    assert_eq!(unsatisfiable_at(result), Stage::Qdss);
}

#[rstest]
#[case::narrow(PeerSearch::Narrow, None)]
#[case::exhaustive(PeerSearch::Exhaustive, Some(vec![0, 2, 1, 3]))]
fn test_shared_dsc_quad_pipe(#[case] policy: PeerSearch, #[case] expected: Option<Vec<BlockId>>) {
    let config = RmConfig::builder().peer_search(policy).build().unwrap();
    let mut h = Harness::with_config(quad_misr_catalog(), config);

    let result = h.reserve(
        1,
        TopologyName::QuadPipe3DMergeDsc,
        HwResources::intfs([1, 2]),
        TopologyControl::empty(),
    );

    match expected {
        Some(lms) => {
            let got = result.unwrap();
            assert_eq!(got, assignment(&lms, &[0], &[0, 1]));
            assert_eq!(h.owned(1, BlockKind::RoiMisr), vec![0, 1]);
            assert_eq!(h.owned(1, BlockKind::Dsc), vec![0, 1]);
        }
        None => {
            assert_eq!(unsatisfiable_at(result), Stage::Mixers);
            assert_eq!(h.state.reserved_count(), 0);
        }
    }
}

#[test]
fn test_pinned_ids_override_narrow_search() {
    let mut h = Harness::new(quad_misr_catalog());
    let pinned = PinnedIds {
        lms: vec![0, 2, 1, 3],
        ctls: vec![0],
        dscs: vec![0, 1],
    };

    let got = h
        .reserve_pinned(1, TopologyName::QuadPipe3DMergeDsc, HwResources::intfs([1, 2]), &pinned)
        .unwrap();
    assert_eq!(got, assignment(&[0, 2, 1, 3], &[0], &[0, 1]));
}

#[rstest]
#[case::too_few_mixers(vec![0, 2], vec![0], vec![0, 1], Stage::Mixers)]
#[case::dsc_not_pinned(vec![0, 2, 1, 3], vec![0], vec![1], Stage::Mixers)]
#[case::dscs_out_of_order(vec![0, 2, 1, 3], vec![0], vec![1, 0], Stage::Mixers)]
#[case::no_dscs_pinned(vec![0, 2, 1, 3], vec![0], vec![], Stage::Mixers)]
#[case::too_few_ctls(vec![0, 2, 1, 3], vec![], vec![0, 1], Stage::Ctl)]
fn test_pinned_mismatch_is_unsatisfiable(
    #[case] lms: Vec<BlockId>,
    #[case] ctls: Vec<BlockId>,
    #[case] dscs: Vec<BlockId>,
    #[case] stage: Stage,
) {
    let mut h = Harness::new(quad_misr_catalog());
    let pinned = PinnedIds { lms, ctls, dscs };

    let result = h.reserve_pinned(
        1,
        TopologyName::QuadPipe3DMergeDsc,
        HwResources::intfs([1, 2]),
        &pinned,
    );
    assert_eq!(unsatisfiable_at(result), stage);
    assert_eq!(h.state.reserved_count(), 0);
}

#[test]
fn test_external_blocks_survive_a_new_reservation() {
    #[derive(Debug)]
    struct Rotator;

    impl crate::pool::ExternalBlock for Rotator {
        fn kind(&self) -> BlockKind {
            BlockKind::Rot
        }

        fn id(&self) -> BlockId {
            0
        }
    }

    let mut h = Harness::new(two_mixer_catalog());
    h.state.inject_external(Arc::new(Rotator), consumer(1)).unwrap();

    h.reserve(1, TopologyName::SinglePipe, HwResources::intfs([1]), TopologyControl::empty())
        .unwrap();
    assert_eq!(h.owned(1, BlockKind::Rot), vec![0]);
}
