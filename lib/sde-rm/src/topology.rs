// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Named pipeline topologies and their resource requirements.
//!
//! A topology is the shape of one display path: how many layer mixers,
//! compression encoders, interfaces and control paths it needs, and whether
//! its control path must drive a split display. Two tables exist, keyed by
//! the control-path protocol of the chip ([`CtlVersion`]); the v1 protocol
//! drives every interface from a single active CTL.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::catalog::CtlVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum TopologyName {
    None,
    SinglePipe,
    SinglePipeDsc,
    DualPipe,
    DualPipeDsc,
    DualPipe3DMerge,
    DualPipe3DMergeDsc,
    DualPipeDscMerge,
    PpSplit,
    QuadPipe3DMerge,
    QuadPipe3DMergeDsc,
    QuadPipeDscMerge,
    QuadPipeDsc4HsMerge,
    SixPipe3DMerge,
    SixPipe3DMergeDsc,
    SixPipeDscMerge,
}

impl TopologyName {
    /// Two mixers blend into one output through the 3D mux.
    pub fn is_3d_merge(self) -> bool {
        matches!(
            self,
            TopologyName::DualPipe3DMerge
                | TopologyName::DualPipe3DMergeDsc
                | TopologyName::QuadPipe3DMerge
                | TopologyName::QuadPipe3DMergeDsc
                | TopologyName::SixPipe3DMerge
                | TopologyName::SixPipe3DMergeDsc
        )
    }

    /// Two compression encoders merge into one interface.
    pub fn is_dsc_merge(self) -> bool {
        matches!(
            self,
            TopologyName::DualPipeDscMerge
                | TopologyName::QuadPipeDscMerge
                | TopologyName::SixPipeDscMerge
        )
    }
}

/// One row of a topology table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDef {
    pub name: TopologyName,
    pub num_lm: u32,
    pub num_enc: u32,
    pub num_intf: u32,
    pub num_ctl: u32,
    pub needs_split_display: bool,
}

impl TopologyDef {
    const fn row(
        name: TopologyName,
        num_lm: u32,
        num_enc: u32,
        num_intf: u32,
        num_ctl: u32,
        needs_split_display: bool,
    ) -> Self {
        Self {
            name,
            num_lm,
            num_enc,
            num_intf,
            num_ctl,
            needs_split_display,
        }
    }

    pub fn is_3d_merge(&self) -> bool {
        self.name.is_3d_merge()
    }

    pub fn is_dsc_merge(&self) -> bool {
        self.name.is_dsc_merge()
    }

    /// The topology that reserves nothing.
    pub const fn none() -> Self {
        Self::row(TopologyName::None, 0, 0, 0, 0, false)
    }
}

use TopologyName as T;

const LEGACY_TABLE: &[TopologyDef] = &[
    TopologyDef::row(T::None, 0, 0, 0, 0, false),
    TopologyDef::row(T::SinglePipe, 1, 0, 1, 1, false),
    TopologyDef::row(T::SinglePipeDsc, 1, 1, 1, 1, false),
    TopologyDef::row(T::DualPipe, 2, 0, 2, 2, true),
    TopologyDef::row(T::DualPipeDsc, 2, 2, 2, 2, true),
    TopologyDef::row(T::DualPipe3DMerge, 2, 0, 1, 1, false),
    TopologyDef::row(T::DualPipe3DMergeDsc, 2, 1, 1, 1, false),
    TopologyDef::row(T::DualPipeDscMerge, 2, 2, 1, 1, false),
    TopologyDef::row(T::PpSplit, 1, 0, 2, 1, true),
    TopologyDef::row(T::QuadPipe3DMerge, 4, 0, 2, 2, true),
    TopologyDef::row(T::QuadPipe3DMergeDsc, 4, 2, 2, 2, true),
    TopologyDef::row(T::QuadPipeDscMerge, 4, 4, 2, 2, true),
    TopologyDef::row(T::QuadPipeDsc4HsMerge, 4, 4, 1, 1, false),
];

const V1_TABLE: &[TopologyDef] = &[
    TopologyDef::row(T::None, 0, 0, 0, 0, false),
    TopologyDef::row(T::SinglePipe, 1, 0, 1, 1, false),
    TopologyDef::row(T::SinglePipeDsc, 1, 1, 1, 1, false),
    TopologyDef::row(T::DualPipe, 2, 0, 2, 1, true),
    TopologyDef::row(T::DualPipeDsc, 2, 2, 2, 1, true),
    TopologyDef::row(T::DualPipe3DMerge, 2, 0, 1, 1, false),
    TopologyDef::row(T::DualPipe3DMergeDsc, 2, 1, 1, 1, false),
    TopologyDef::row(T::DualPipeDscMerge, 2, 2, 1, 1, false),
    TopologyDef::row(T::PpSplit, 1, 0, 2, 1, true),
    TopologyDef::row(T::QuadPipe3DMerge, 4, 0, 2, 1, true),
    TopologyDef::row(T::QuadPipe3DMergeDsc, 4, 2, 2, 1, true),
    TopologyDef::row(T::QuadPipeDscMerge, 4, 4, 2, 1, true),
    TopologyDef::row(T::QuadPipeDsc4HsMerge, 4, 4, 1, 1, false),
    TopologyDef::row(T::SixPipe3DMerge, 6, 0, 3, 1, true),
    TopologyDef::row(T::SixPipe3DMergeDsc, 6, 3, 3, 1, true),
    TopologyDef::row(T::SixPipeDscMerge, 6, 6, 3, 1, true),
];

/// Active topology table, selected once per chip.
#[derive(Debug, Clone, Copy)]
pub struct TopologyTable {
    version: CtlVersion,
    rows: &'static [TopologyDef],
}

impl TopologyTable {
    pub fn for_version(version: CtlVersion) -> Self {
        let rows = match version {
            CtlVersion::Legacy => LEGACY_TABLE,
            CtlVersion::V1 => V1_TABLE,
        };
        Self { version, rows }
    }

    pub fn version(&self) -> CtlVersion {
        self.version
    }

    pub fn rows(&self) -> &'static [TopologyDef] {
        self.rows
    }

    /// First row whose `(lm, enc, intf)` equals the request.
    ///
    /// Unmatched shapes resolve to [`TopologyName::None`]; a display with no
    /// topology is a valid (disabled) configuration, not an error.
    pub fn resolve(&self, num_lm: u32, num_enc: u32, num_intf: u32) -> TopologyName {
        self.rows
            .iter()
            .find(|row| row.num_lm == num_lm && row.num_enc == num_enc && row.num_intf == num_intf)
            .map(|row| row.name)
            .unwrap_or(TopologyName::None)
    }

    pub fn get(&self, name: TopologyName) -> Option<&'static TopologyDef> {
        self.rows.iter().find(|row| row.name == name)
    }

    /// Definition for `name`, or the empty topology if this table lacks it.
    pub fn def(&self, name: TopologyName) -> TopologyDef {
        self.get(name).copied().unwrap_or_else(TopologyDef::none)
    }

    pub fn num_encoders_for(&self, name: TopologyName) -> u32 {
        self.get(name).map(|row| row.num_enc).unwrap_or(0)
    }

    /// Number of DSC (or ROI-MISR, on hardware that has it) blocks `name`
    /// occupies.
    ///
    /// ROI-MISR hardware needs one checksum path per interface, except
    /// ping-pong split which has none and the DSC-merge variants which carry
    /// two post-blend paths per interface.
    pub fn num_dsc_or_misr_blocks_for(&self, name: TopologyName, has_roi_misr: bool) -> u32 {
        let Some(row) = self.get(name) else {
            return 0;
        };

        if !has_roi_misr {
            return row.num_enc;
        }

        match name {
            TopologyName::PpSplit => 0,
            n if n.is_dsc_merge() => 2 * row.num_intf,
            _ => row.num_intf,
        }
    }
}
