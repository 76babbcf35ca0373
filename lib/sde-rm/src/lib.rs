// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Display hardware resource manager.
//!
//! This crate provides the reservation core of a display controller:
//! - Immutable hardware catalog with static block wiring
//! - Block pool with copy-on-write reservation snapshots
//! - Topology resolution from pixel-pipeline shapes
//! - Backtracking reservation engine (mixers, CTL, INTF/WB, CDM, DSC, QDSS)
//! - Resource manager orchestration, transactions and continuation splash

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod pool;
pub mod topology;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use strum::Display;

// Re-export common types and traits
pub use catalog::{Catalog, CatalogBuilder, CatalogDescription, CtlVersion};
pub use config::{PeerSearch, RmConfig};
pub use engine::{
    Assignment, HwResources, PinnedIds, PipelineShape, ReservationRequirements, TopologyControl,
};
pub use error::{RmError, Stage};
pub use manager::{
    ReservationHandle, ReserveMode, ResourceManager, ResourceManagerBuilder, RmBuilderError,
    SplashHandoff, SplashOutcome, Transaction,
};
pub use metrics::{MetricsAggregator, RmMetrics};
pub use pool::{ExternalBlock, HwBlock, HwPool, ReservationState, ResourceMask};
pub use topology::{TopologyDef, TopologyName, TopologyTable};

/// Hardware block id, unique within a [`BlockKind`].
pub type BlockId = u32;

/// Identity of a display path (encoder) that holds reservations.
///
/// Zero is reserved for "free" in hardware bookkeeping, so a consumer id is
/// always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerId(NonZeroU32);

impl ConsumerId {
    /// Returns `None` for zero.
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enc{}", self.0)
    }
}

/// Kind of display hardware block.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
pub enum BlockKind {
    /// Layer mixer
    Lm,
    /// Post-blend colour processing
    Dspp,
    /// Destination scaler
    Ds,
    /// Control path
    Ctl,
    /// Chroma down mux
    Cdm,
    Pingpong,
    /// Timing interface
    Intf,
    /// Writeback
    Wb,
    /// Display stream compression encoder
    Dsc,
    RoiMisr,
    /// Inline rotator, only ever reserved as an external block
    Rot,
    Qdss,
    /// Top-level MDP block, not pool managed
    Top,
    /// Source pipe, owned by the plane subsystem
    Sspp,
}

impl BlockKind {
    /// Every kind the block pool can hold.
    pub const POOL_KINDS: [BlockKind; 12] = [
        BlockKind::Lm,
        BlockKind::Dspp,
        BlockKind::Ds,
        BlockKind::Ctl,
        BlockKind::Cdm,
        BlockKind::Pingpong,
        BlockKind::Intf,
        BlockKind::Wb,
        BlockKind::Dsc,
        BlockKind::RoiMisr,
        BlockKind::Rot,
        BlockKind::Qdss,
    ];

    pub fn is_pool_managed(self) -> bool {
        !matches!(self, BlockKind::Top | BlockKind::Sspp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_id_rejects_zero() {
        assert!(ConsumerId::new(0).is_none());
        assert_eq!(ConsumerId::new(7).map(ConsumerId::get), Some(7));
    }

    #[test]
    fn test_pool_kinds_exclude_top_and_sspp() {
        assert!(BlockKind::POOL_KINDS.iter().all(|k| k.is_pool_managed()));
        assert!(!BlockKind::Top.is_pool_managed());
        assert!(!BlockKind::Sspp.is_pool_managed());
    }

    #[test]
    fn test_consumer_id_display() {
        let id = ConsumerId::new(3).unwrap();
        assert_eq!(id.to_string(), "enc3");
    }
}
