// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Reservation orchestration for the display driver.
//!
//! [`ResourceManager`] owns the block pool, the topology table chosen for the
//! chip and the engine configuration. Display paths reserve through it,
//! either one call at a time or batched in a [`Transaction`] that publishes
//! all of its changes at once.
//!
//! Construction uses a builder pattern, see [`ResourceManagerBuilder`].

mod builder;
mod transaction;


pub use builder::{ResourceManagerBuilder, RmBuilderError};
pub use transaction::Transaction;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::config::RmConfig;
use crate::engine::{
    Assignment, HwResources, PinnedIds, PipelineShape, ReservationRequirements, TopologyControl,
};
use crate::error::{Result, RmError};
use crate::metrics::RmMetrics;
use crate::pool::{HwIter, HwPool, IterFilter, ReservationState, ResourceMask};
use crate::topology::{TopologyName, TopologyTable};
use crate::{BlockId, BlockKind, ConsumerId};

/// Whether a standalone reservation is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReserveMode {
    #[default]
    Commit,
    /// Check that the reservation fits and discard it, unless the request
    /// carries [`TopologyControl::RESERVE_LOCK`].
    TestOnly,
}

/// What a successful reservation gave a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationHandle {
    pub consumer: ConsumerId,
    pub topology: TopologyName,
    pub mask: ResourceMask,
    /// Every block the consumer now holds, in pool order.
    pub blocks: Vec<(BlockKind, BlockId)>,
    pub assignment: Assignment,
}

impl ReservationHandle {
    fn new(state: &ReservationState, consumer: ConsumerId, assignment: Assignment) -> Self {
        Self {
            consumer,
            topology: state.topology_for(consumer).unwrap_or(TopologyName::None),
            mask: state.mask_for(consumer),
            blocks: state.blocks_for(consumer),
            assignment,
        }
    }
}

/// One display a previous boot stage left running.
#[derive(Debug, Clone)]
pub struct SplashHandoff {
    pub consumer: ConsumerId,
    pub requirements: ReservationRequirements,
    /// Block ids read back from hardware.
    pub pinned: PinnedIds,
}

#[derive(Debug)]
pub enum SplashOutcome {
    /// The display keeps the exact blocks it booted with.
    Seamless(ReservationHandle),
    /// The pinned ids did not fit; the display got a fresh reservation and
    /// will glitch once while the driver reprograms it.
    Fallback(ReservationHandle),
    Failed(RmError),
}

impl SplashOutcome {
    pub fn handle(&self) -> Option<&ReservationHandle> {
        match self {
            SplashOutcome::Seamless(handle) | SplashOutcome::Fallback(handle) => Some(handle),
            SplashOutcome::Failed(_) => None,
        }
    }
}

/// Thread-safe entry point for display resource reservation.
///
/// Writers are serialised through an internal [`Mutex`]; readers see the
/// last committed state without blocking on it.
///
/// Construct via [`ResourceManager::builder()`].
pub struct ResourceManager {
    pool: HwPool,
    topology: TopologyTable,
    config: RmConfig,
    metrics: Arc<RmMetrics>,
    writer: Mutex<()>,
}

impl ResourceManager {
    /// Create a new builder for ResourceManager.
    ///
    /// # Example
    /// ```ignore
    /// let manager = ResourceManager::builder()
    ///     .catalog(catalog)
    ///     .config(RmConfig::from_env())
    ///     .build()?;
    /// ```
    pub fn builder() -> ResourceManagerBuilder {
        ResourceManagerBuilder::default()
    }

    /// Open a transaction over the committed state. Blocks while another
    /// transaction is open.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self, self.writer.lock())
    }

    /// Reserve `reqs` for `consumer` in a transaction of its own.
    pub fn reserve(
        &self,
        consumer: ConsumerId,
        reqs: &ReservationRequirements,
        mode: ReserveMode,
    ) -> Result<ReservationHandle> {
        let mut txn = self.begin();
        let handle = txn.reserve(consumer, reqs)?;

        if mode == ReserveMode::Commit || reqs.wants(TopologyControl::RESERVE_LOCK) {
            txn.commit();
        } else {
            tracing::debug!(%consumer, topology = %handle.topology, "test-only reservation fits");
        }
        Ok(handle)
    }

    /// Reserve exactly the given ids and commit.
    pub fn reserve_pinned(
        &self,
        consumer: ConsumerId,
        reqs: &ReservationRequirements,
        pinned: &PinnedIds,
    ) -> Result<ReservationHandle> {
        let mut txn = self.begin();
        let handle = txn.reserve_pinned(consumer, reqs, pinned)?;
        txn.commit();
        Ok(handle)
    }

    /// Drop and commit every reservation `consumer` holds. Returns the number
    /// of blocks freed.
    pub fn release(&self, consumer: ConsumerId) -> usize {
        let mut txn = self.begin();
        let freed = txn.release(consumer);
        txn.commit();
        freed
    }

    /// Hand displays over from the boot splash in one transaction.
    ///
    /// Each display first tries its pinned ids; if they no longer fit it
    /// falls back to a normal search. Outcomes follow input order.
    pub fn handoff_splash(&self, displays: &[SplashHandoff]) -> Vec<SplashOutcome> {
        let mut txn = self.begin();

        let outcomes = displays
            .iter()
            .map(|splash| {
                let consumer = splash.consumer;
                match txn.reserve_pinned(consumer, &splash.requirements, &splash.pinned) {
                    Ok(handle) => return SplashOutcome::Seamless(handle),
                    Err(err) => {
                        tracing::warn!(%consumer, error = %err, pinned = ?splash.pinned, "splash blocks do not fit, falling back");
                    }
                }
                match txn.reserve(consumer, &splash.requirements) {
                    Ok(handle) => SplashOutcome::Fallback(handle),
                    Err(err) => {
                        tracing::warn!(%consumer, error = %err, "splash display could not be reserved");
                        SplashOutcome::Failed(err)
                    }
                }
            })
            .collect();

        txn.commit();
        outcomes
    }

    /// Uuids of every block `consumer` holds in the committed state.
    pub fn query_resource_mask(&self, consumer: ConsumerId) -> ResourceMask {
        self.pool.current().mask_for(consumer)
    }

    /// Blocks of `kind` held by `consumer`, over a pinned committed snapshot.
    pub fn get_hw_for(
        &self,
        consumer: ConsumerId,
        kind: BlockKind,
    ) -> HwIter<Arc<ReservationState>> {
        HwIter::new(self.pool.current(), kind, IterFilter::OwnedBy(consumer))
    }

    pub fn topology_for(&self, consumer: ConsumerId) -> Option<TopologyName> {
        self.pool.current().topology_for(consumer)
    }

    /// Resolve a pipeline shape on this chip's topology table.
    pub fn requirements(
        &self,
        shape: PipelineShape,
        hw: HwResources,
        controls: TopologyControl,
    ) -> ReservationRequirements {
        ReservationRequirements::new(shape, hw, controls, &self.topology)
    }

    /// The committed state.
    pub fn current(&self) -> Arc<ReservationState> {
        self.pool.current()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.pool.catalog()
    }

    pub fn topology_table(&self) -> &TopologyTable {
        &self.topology
    }

    pub fn config(&self) -> &RmConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<RmMetrics> {
        &self.metrics
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .finish()
    }
}
