// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Trial reservation state that becomes visible only on commit.

use std::sync::Arc;

use parking_lot::MutexGuard;

use super::{ReservationHandle, ResourceManager};
use crate::ConsumerId;
use crate::engine::{self, PinnedIds, ReservationRequirements, TopologyControl};
use crate::error::Result;
use crate::pool::{ExternalBlock, ReservationState, ResourceMask};

/// A batch of reservation changes against one snapshot of the pool.
///
/// Holds the manager's writer lock for its whole lifetime, so at most one
/// transaction exists per manager and its snapshot can never go stale.
/// Calling [`ResourceManager`] mutators while a transaction is open on the
/// same thread deadlocks.
///
/// Dropping a transaction without [`commit`](Self::commit) discards every
/// change and destroys the external blocks injected through it.
pub struct Transaction<'a> {
    manager: &'a ResourceManager,
    _writer: MutexGuard<'a, ()>,
    state: ReservationState,
    injected: Vec<Arc<dyn ExternalBlock>>,
    released: Vec<Arc<dyn ExternalBlock>>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    pub(super) fn new(manager: &'a ResourceManager, writer: MutexGuard<'a, ()>) -> Self {
        Self {
            manager,
            _writer: writer,
            state: manager.pool.snapshot(),
            injected: Vec::new(),
            released: Vec::new(),
            committed: false,
        }
    }

    /// The trial state, including every change made so far.
    pub fn state(&self) -> &ReservationState {
        &self.state
    }

    /// Reserve `reqs` for `consumer` in the trial state.
    ///
    /// On error the trial state is exactly as before the call.
    pub fn reserve(
        &mut self,
        consumer: ConsumerId,
        reqs: &ReservationRequirements,
    ) -> Result<ReservationHandle> {
        self.reserve_inner(consumer, reqs, None)
    }

    /// Reserve exactly the mixers, CTLs and DSCs a previous boot stage left
    /// active.
    pub fn reserve_pinned(
        &mut self,
        consumer: ConsumerId,
        reqs: &ReservationRequirements,
        pinned: &PinnedIds,
    ) -> Result<ReservationHandle> {
        self.reserve_inner(consumer, reqs, Some(pinned))
    }

    fn reserve_inner(
        &mut self,
        consumer: ConsumerId,
        reqs: &ReservationRequirements,
        pinned: Option<&PinnedIds>,
    ) -> Result<ReservationHandle> {
        let manager = self.manager;
        let mut scratch = self.state.clone();

        let cleared = if reqs.wants(TopologyControl::RESERVE_CLEAR) {
            scratch.release(consumer)
        } else {
            Vec::new()
        };

        let result = engine::reserve(
            &mut scratch,
            &manager.topology,
            &manager.config,
            consumer,
            reqs,
            pinned,
        );

        match result {
            Ok(assignment) => {
                self.state = scratch;
                self.released.extend(cleared);
                manager.metrics.inc_reservations();
                Ok(ReservationHandle::new(&self.state, consumer, assignment))
            }
            Err(err) => {
                manager.metrics.inc_reservation_failures();
                tracing::debug!(%consumer, error = %err, recoverable = err.is_recoverable(), "reservation rejected");
                Err(err)
            }
        }
    }

    /// Drop every reservation `consumer` holds. Returns the number of blocks
    /// freed.
    pub fn release(&mut self, consumer: ConsumerId) -> usize {
        let freed = self.state.mask_for(consumer).count() as usize;
        let removed = self.state.release(consumer);
        self.released.extend(removed);
        self.manager.metrics.inc_releases();
        tracing::debug!(%consumer, freed, "consumer released");
        freed
    }

    /// Add a block created outside the pool, held by `consumer` until it is
    /// released. Returns the block's uuid.
    pub fn inject_external(
        &mut self,
        block: Arc<dyn ExternalBlock>,
        consumer: ConsumerId,
    ) -> Result<u8> {
        let uuid = self.state.inject_external(block.clone(), consumer)?;
        self.injected.push(block);
        self.manager.metrics.inc_external_injections();
        Ok(uuid)
    }

    pub fn query_resource_mask(&self, consumer: ConsumerId) -> ResourceMask {
        self.state.mask_for(consumer)
    }

    /// Publish the trial state and return its version.
    ///
    /// External blocks released in this transaction are destroyed once the
    /// new state is visible.
    pub fn commit(mut self) -> u64 {
        let manager = self.manager;
        let version = manager.pool.commit(self.state.clone());
        self.committed = true;

        for block in self.released.drain(..) {
            tracing::debug!(kind = %block.kind(), id = block.id(), "destroying released external block");
            block.destroy();
        }

        manager.metrics.inc_commits();
        manager
            .metrics
            .set_reserved_blocks(self.state.reserved_count() as i64);
        version
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        for block in self.injected.drain(..) {
            tracing::debug!(kind = %block.kind(), id = block.id(), "destroying external block from discarded transaction");
            block.destroy();
        }
        self.manager.metrics.inc_discards();
        tracing::trace!("transaction discarded");
    }
}
