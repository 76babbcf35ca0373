// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Hardware block pool.
//!
//! The pool owns one entry per catalog block and publishes the committed
//! [`ReservationState`] behind an atomically swapped `Arc`:
//!
//! - [`HwPool::current`] hands readers the committed state; they never see a
//!   half-applied reservation.
//! - [`HwPool::snapshot`] deep-copies it for a trial reservation.
//! - [`HwPool::commit`] installs a trial state. Dropping a snapshot discards it.

mod iter;
mod mask;
mod state;

pub use iter::{HwIter, IterFilter};
pub use mask::ResourceMask;
pub use state::{BlockEntry, ReservationState};

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::{BlockId, BlockKind, ConsumerId};

/// A block constructed outside the pool by a companion subsystem.
///
/// Its lifetime is tied to the consumer it was injected for: releasing the
/// consumer removes it from the pool and calls [`destroy`](Self::destroy)
/// once the release is committed.
pub trait ExternalBlock: Send + Sync + fmt::Debug {
    fn kind(&self) -> BlockKind;
    fn id(&self) -> BlockId;

    /// Tear down the block. Called at most once.
    fn destroy(&self) {}
}

/// Read-only view of one pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwBlock {
    pub kind: BlockKind,
    pub id: BlockId,
    pub uuid: u8,
    pub reserved_by: Option<ConsumerId>,
    pub external: bool,
}

impl HwBlock {
    pub fn is_free(&self) -> bool {
        self.reserved_by.is_none()
    }
}

/// Block pool with copy-on-write reservation state.
pub struct HwPool {
    catalog: Arc<Catalog>,
    committed: RwLock<Arc<ReservationState>>,
}

impl HwPool {
    /// Create one free entry per catalog block.
    ///
    /// Fails with [`RmError::ResourceExhausted`](crate::RmError::ResourceExhausted)
    /// if the catalog does not fit the uuid space.
    pub fn new(catalog: Arc<Catalog>) -> Result<Self> {
        let state = ReservationState::new(catalog.clone())?;
        tracing::debug!(blocks = state.entries().len(), "block pool created");
        Ok(Self {
            catalog,
            committed: RwLock::new(Arc::new(state)),
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// The committed state.
    pub fn current(&self) -> Arc<ReservationState> {
        self.committed.read().clone()
    }

    /// Deep copy of the committed state for a trial reservation.
    pub fn snapshot(&self) -> ReservationState {
        ReservationState::clone(&self.current())
    }

    /// Install `state` as the committed state and return its version.
    ///
    /// Never fails. Installing a snapshot taken from an older version
    /// overwrites whatever was committed since; callers serialise writers.
    pub fn commit(&self, mut state: ReservationState) -> u64 {
        let mut committed = self.committed.write();
        if state.version() != committed.version() {
            tracing::warn!(
                snapshot = state.version(),
                committed = committed.version(),
                "committing a stale reservation snapshot"
            );
        }
        let version = committed.version() + 1;
        state.set_version(version);
        tracing::trace!(?state, "reservation state committed");
        *committed = Arc::new(state);
        version
    }
}

impl fmt::Debug for HwPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HwPool")
            .field("committed", &self.current())
            .finish()
    }
}
