// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Versioned reservation state: who holds which pool block.
//!
//! A [`ReservationState`] is a flat arena of [`BlockEntry`] values in pool
//! order. Cloning it is the snapshot operation; a trial reservation mutates
//! its own clone and is either committed through
//! [`HwPool::commit`](super::HwPool::commit) or dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::{ExternalBlock, HwBlock, HwIter, IterFilter, ResourceMask};
use crate::catalog::{Catalog, MAX_POOL_BLOCKS};
use crate::error::{Result, RmError};
use crate::topology::TopologyName;
use crate::{BlockId, BlockKind, ConsumerId};

/// One pool block and its current owner.
#[derive(Clone)]
pub struct BlockEntry {
    kind: BlockKind,
    id: BlockId,
    uuid: u8,
    reserved_by: Option<ConsumerId>,
    external: Option<Arc<dyn ExternalBlock>>,
}

impl BlockEntry {
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn uuid(&self) -> u8 {
        self.uuid
    }

    pub fn reserved_by(&self) -> Option<ConsumerId> {
        self.reserved_by
    }

    /// Injected from outside the pool; removed rather than freed on release.
    pub fn is_external(&self) -> bool {
        self.external.is_some()
    }

    pub fn external(&self) -> Option<&Arc<dyn ExternalBlock>> {
        self.external.as_ref()
    }

    pub fn view(&self) -> HwBlock {
        HwBlock {
            kind: self.kind,
            id: self.id,
            uuid: self.uuid,
            reserved_by: self.reserved_by,
            external: self.is_external(),
        }
    }
}

impl fmt::Debug for BlockEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockEntry")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("uuid", &self.uuid)
            .field("reserved_by", &self.reserved_by)
            .field("external", &self.is_external())
            .finish()
    }
}

#[derive(Clone)]
pub struct ReservationState {
    catalog: Arc<Catalog>,
    entries: Vec<BlockEntry>,
    topologies: BTreeMap<ConsumerId, TopologyName>,
    version: u64,
}

impl ReservationState {
    /// Fresh state with one free entry per catalog block; uuids follow
    /// catalog order.
    pub(crate) fn new(catalog: Arc<Catalog>) -> Result<Self> {
        let mut entries = Vec::with_capacity(catalog.blocks().len());
        for (uuid, block) in catalog.blocks().iter().enumerate() {
            if uuid >= MAX_POOL_BLOCKS {
                return Err(RmError::ResourceExhausted(format!(
                    "{} pool blocks do not fit {MAX_POOL_BLOCKS} uuids",
                    catalog.blocks().len()
                )));
            }
            entries.push(BlockEntry {
                kind: block.kind(),
                id: block.id(),
                uuid: uuid as u8,
                reserved_by: None,
                external: None,
            });
        }

        Ok(Self {
            catalog,
            entries,
            topologies: BTreeMap::new(),
            version: 0,
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Committed version this state descends from.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    pub fn position(&self, kind: BlockKind, id: BlockId) -> Option<usize> {
        self.entries.iter().position(|e| e.kind == kind && e.id == id)
    }

    pub fn entry(&self, kind: BlockKind, id: BlockId) -> Option<&BlockEntry> {
        self.position(kind, id).map(|i| &self.entries[i])
    }

    pub fn owner(&self, kind: BlockKind, id: BlockId) -> Option<ConsumerId> {
        self.entry(kind, id).and_then(BlockEntry::reserved_by)
    }

    /// Blocks of `kind` that are free, plus those held by `consumer` when one
    /// is given.
    pub fn iter(&self, kind: BlockKind, consumer: Option<ConsumerId>) -> HwIter<&Self> {
        HwIter::new(self, kind, consumer.into())
    }

    pub fn owned_by(&self, consumer: ConsumerId, kind: BlockKind) -> HwIter<&Self> {
        HwIter::new(self, kind, IterFilter::OwnedBy(consumer))
    }

    pub fn mask_for(&self, consumer: ConsumerId) -> ResourceMask {
        self.entries
            .iter()
            .filter(|e| e.reserved_by == Some(consumer))
            .map(|e| e.uuid)
            .collect()
    }

    /// `(kind, id)` of every block held by `consumer`, in pool order.
    pub fn blocks_for(&self, consumer: ConsumerId) -> Vec<(BlockKind, BlockId)> {
        self.entries
            .iter()
            .filter(|e| e.reserved_by == Some(consumer))
            .map(|e| (e.kind, e.id))
            .collect()
    }

    pub fn topology_for(&self, consumer: ConsumerId) -> Option<TopologyName> {
        self.topologies.get(&consumer).copied()
    }

    pub(crate) fn set_topology(&mut self, consumer: ConsumerId, topology: TopologyName) {
        self.topologies.insert(consumer, topology);
    }

    pub fn consumers(&self) -> BTreeSet<ConsumerId> {
        self.entries.iter().filter_map(|e| e.reserved_by).collect()
    }

    pub fn reserved_count(&self) -> usize {
        self.entries.iter().filter(|e| e.reserved_by.is_some()).count()
    }

    /// Same blocks with the same owners, ignoring version.
    pub fn same_reservations(&self, other: &ReservationState) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().zip(&other.entries).all(|(a, b)| {
                (a.kind, a.id, a.uuid, a.reserved_by) == (b.kind, b.id, b.uuid, b.reserved_by)
            })
    }

    pub(crate) fn entry_at(&self, pos: usize) -> &BlockEntry {
        &self.entries[pos]
    }

    /// Free, or already held by `consumer`.
    pub(crate) fn is_available(&self, pos: usize, consumer: ConsumerId) -> bool {
        match self.entries[pos].reserved_by {
            None => true,
            Some(owner) => owner == consumer,
        }
    }

    /// Set the owner of the block at `pos`, returning the previous owner.
    pub(crate) fn set_owner(
        &mut self,
        pos: usize,
        owner: Option<ConsumerId>,
    ) -> Option<ConsumerId> {
        std::mem::replace(&mut self.entries[pos].reserved_by, owner)
    }

    /// Add a block created outside the pool, reserved by `consumer`.
    ///
    /// Takes the lowest free uuid.
    pub fn inject_external(
        &mut self,
        block: Arc<dyn ExternalBlock>,
        consumer: ConsumerId,
    ) -> Result<u8> {
        let (kind, id) = (block.kind(), block.id());
        if !kind.is_pool_managed() {
            return Err(RmError::InternalInconsistency(format!(
                "{kind} blocks cannot be pool managed"
            )));
        }
        if self.position(kind, id).is_some() {
            return Err(RmError::InternalInconsistency(format!(
                "{kind} {id} is already in the pool"
            )));
        }

        let used: ResourceMask = self.entries.iter().map(|e| e.uuid).collect();
        let uuid = (0..MAX_POOL_BLOCKS as u8)
            .find(|&uuid| !used.contains(uuid))
            .ok_or_else(|| {
                RmError::ResourceExhausted(format!("no uuid left for external {kind} {id}"))
            })?;

        tracing::debug!(%kind, id, uuid, %consumer, "injecting external block");
        self.entries.push(BlockEntry {
            kind,
            id,
            uuid,
            reserved_by: Some(consumer),
            external: Some(block),
        });
        Ok(uuid)
    }

    /// Drop every reservation held by `consumer`.
    ///
    /// External blocks leave the pool; they are returned so the caller can
    /// destroy them once the release is committed.
    pub(crate) fn release(&mut self, consumer: ConsumerId) -> Vec<Arc<dyn ExternalBlock>> {
        let mut removed = Vec::new();
        self.entries.retain_mut(|entry| {
            if entry.reserved_by != Some(consumer) {
                return true;
            }
            match entry.external.take() {
                Some(external) => {
                    removed.push(external);
                    false
                }
                None => {
                    entry.reserved_by = None;
                    true
                }
            }
        });
        self.topologies.remove(&consumer);
        removed
    }
}

impl fmt::Debug for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservationState")
            .field("version", &self.version)
            .field(
                "reserved",
                &self
                    .entries
                    .iter()
                    .filter(|e| e.reserved_by.is_some())
                    .collect::<Vec<_>>(),
            )
            .field("topologies", &self.topologies)
            .finish()
    }
}
