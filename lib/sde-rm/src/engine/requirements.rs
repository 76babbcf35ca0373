// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-attempt reservation input.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::BlockId;
use crate::topology::{TopologyDef, TopologyName, TopologyTable};

bitflags! {
    /// Caller controls for one reservation attempt.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TopologyControl: u32 {
        /// Commit even when the attempt is test-only.
        const RESERVE_LOCK = 1 << 0;
        /// Drop the consumer's existing reservation before reserving.
        const RESERVE_CLEAR = 1 << 1;
        const DSPP = 1 << 2;
        const DS = 1 << 3;
        /// Mixers must support concurrent writeback.
        const CWB = 1 << 4;
        const FORCE_SPLIT_CTL = 1 << 5;
        /// Drive a single-mixer shape with two mixers.
        const FORCE_TILING = 1 << 6;
        const PPSPLIT = 1 << 7;
    }
}

/// Pixel pipeline shape requested by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineShape {
    pub num_lm: u32,
    pub num_enc: u32,
    pub num_intf: u32,
}

impl PipelineShape {
    pub fn new(num_lm: u32, num_enc: u32, num_intf: u32) -> Self {
        Self {
            num_lm,
            num_enc,
            num_intf,
        }
    }
}

/// Hardware the encoder already drives, fixed at probe time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HwResources {
    pub intfs: Vec<BlockId>,
    pub wbs: Vec<BlockId>,
    pub needs_cdm: bool,
    pub is_primary: bool,
}

impl HwResources {
    pub fn intfs(intfs: impl IntoIterator<Item = BlockId>) -> Self {
        Self {
            intfs: intfs.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn wbs(mut self, wbs: impl IntoIterator<Item = BlockId>) -> Self {
        self.wbs = wbs.into_iter().collect();
        self
    }

    pub fn with_cdm(mut self) -> Self {
        self.needs_cdm = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

/// Block ids a previous boot stage left active, read back from hardware.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PinnedIds {
    pub lms: Vec<BlockId>,
    pub ctls: Vec<BlockId>,
    pub dscs: Vec<BlockId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequirements {
    controls: TopologyControl,
    topology: TopologyDef,
    hw: HwResources,
}

impl ReservationRequirements {
    /// Resolve `shape` against `table` and apply the shape-altering controls.
    pub fn new(
        shape: PipelineShape,
        hw: HwResources,
        controls: TopologyControl,
        table: &TopologyTable,
    ) -> Self {
        let PipelineShape {
            mut num_lm,
            num_enc,
            num_intf,
        } = shape;

        let mut name = table.resolve(num_lm, num_enc, num_intf);

        if controls.contains(TopologyControl::FORCE_TILING) && num_lm == 1 {
            let tiled = table.resolve(2, num_enc, num_intf);
            if tiled != TopologyName::None {
                num_lm = 2;
                name = tiled;
            } else {
                tracing::debug!(?shape, "no tiled topology for shape");
            }
        }

        if controls.contains(TopologyControl::PPSPLIT)
            && num_enc == 0
            && num_intf == 2
            && matches!(num_lm, 1 | 2)
        {
            name = TopologyName::PpSplit;
        }

        let topology = table.def(name);
        tracing::debug!(?shape, topology = %topology.name, ?controls, "requirements resolved");
        Self {
            controls,
            topology,
            hw,
        }
    }

    /// Requirements for a known topology, skipping shape resolution.
    pub fn for_topology(
        name: TopologyName,
        hw: HwResources,
        controls: TopologyControl,
        table: &TopologyTable,
    ) -> Self {
        Self {
            controls,
            topology: table.def(name),
            hw,
        }
    }

    pub fn controls(&self) -> TopologyControl {
        self.controls
    }

    pub fn topology(&self) -> &TopologyDef {
        &self.topology
    }

    pub fn hw(&self) -> &HwResources {
        &self.hw
    }

    pub fn wants(&self, control: TopologyControl) -> bool {
        self.controls.contains(control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CtlVersion;
    use rstest::rstest;

    fn table() -> TopologyTable {
        TopologyTable::for_version(CtlVersion::Legacy)
    }

    #[rstest]
    #[case(PipelineShape::new(1, 0, 1), TopologyControl::empty(), TopologyName::SinglePipe)]
    #[case(PipelineShape::new(1, 0, 1), TopologyControl::FORCE_TILING, TopologyName::DualPipe3DMerge)]
    #[case(PipelineShape::new(1, 1, 1), TopologyControl::FORCE_TILING, TopologyName::DualPipe3DMergeDsc)]
    #[case(PipelineShape::new(2, 0, 2), TopologyControl::PPSPLIT, TopologyName::PpSplit)]
    #[case(PipelineShape::new(1, 0, 2), TopologyControl::PPSPLIT, TopologyName::PpSplit)]
    #[case(PipelineShape::new(2, 2, 2), TopologyControl::PPSPLIT, TopologyName::DualPipeDsc)]
    #[case(PipelineShape::new(3, 0, 1), TopologyControl::empty(), TopologyName::None)]
    fn test_shape_resolution(
        #[case] shape: PipelineShape,
        #[case] controls: TopologyControl,
        #[case] expected: TopologyName,
    ) {
        let reqs = ReservationRequirements::new(shape, HwResources::default(), controls, &table());
        assert_eq!(reqs.topology().name, expected);
    }

    #[test]
    fn test_force_tiling_without_tiled_row_keeps_shape() {
        // (2, 0, 3) exists in neither table, so (1, 0, 3) stays unresolved.
        let reqs = ReservationRequirements::new(
            PipelineShape::new(1, 0, 3),
            HwResources::default(),
            TopologyControl::FORCE_TILING,
            &table(),
        );
        assert_eq!(reqs.topology().name, TopologyName::None);
        assert_eq!(reqs.topology().num_lm, 0);
    }

    #[test]
    fn test_hw_resources_builder() {
        let hw = HwResources::intfs([1, 2]).wbs([0]).with_cdm().primary();
        assert_eq!(hw.intfs, vec![1, 2]);
        assert_eq!(hw.wbs, vec![0]);
        assert!(hw.needs_cdm && hw.is_primary);

        let reqs = ReservationRequirements::for_topology(
            TopologyName::DualPipe,
            hw,
            TopologyControl::DSPP | TopologyControl::CWB,
            &table(),
        );
        assert!(reqs.wants(TopologyControl::CWB));
        assert!(!reqs.wants(TopologyControl::DS));
        assert_eq!(reqs.topology().num_ctl, 2);
    }
}
