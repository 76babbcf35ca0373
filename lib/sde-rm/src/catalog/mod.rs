// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Immutable description of a chip's display hardware.
//!
//! The [`Catalog`] lists every block instance the chip exposes together with
//! its static wiring: which pingpong, DSPP, destination scaler and ROI-MISR a
//! layer mixer is hardwired to, which mixers and DSC encoders may pair, which
//! interfaces a CDM reaches. It is built once through [`CatalogBuilder`] (or
//! from a [`CatalogDescription`]) and is read-only afterwards.
//!
//! Malformed wiring is rejected at build time with a [`CatalogError`]; the
//! reservation engine relies on the validated invariants.

mod description;

pub use description::{CatalogDescription, DescriptionError};

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BlockId, BlockKind};

/// Upper bound on pool-managed blocks: uuids index a 64-bit mask.
pub const MAX_POOL_BLOCKS: usize = 64;

/// Control-path programming protocol; selects the topology table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtlVersion {
    #[default]
    Legacy,
    V1,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct LmFeatures: u32 {
        /// Reserved for the primary display unless pinned.
        const PRIMARY_PREF = 1 << 0;
        /// Mixer output can be tapped for concurrent writeback.
        const CWB_PREF = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CtlFeatures: u32 {
        const SPLIT_DISPLAY = 1 << 0;
        const PINGPONG_SPLIT = 1 << 1;
        const PRIMARY_PREF = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PingpongFeatures: u32 {
        /// Can be the master of a ping-pong split.
        const SPLIT = 1 << 0;
        /// Slave half of a ping-pong split.
        const SLAVE = 1 << 1;
    }
}

/// Set of block ids below 64.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<BlockId>", into = "Vec<BlockId>")]
pub struct IdMask(u64);

impl IdMask {
    pub const EMPTY: IdMask = IdMask(0);

    pub fn from_ids(ids: &[BlockId]) -> Result<Self, CatalogError> {
        ids.iter().try_fold(Self::EMPTY, |mask, &id| mask.with(id))
    }

    pub fn with(self, id: BlockId) -> Result<Self, CatalogError> {
        if id as usize >= MAX_POOL_BLOCKS {
            return Err(CatalogError::IdOutOfRange { id });
        }
        Ok(IdMask(self.0 | (1u64 << id)))
    }

    pub fn contains(self, id: BlockId) -> bool {
        (id as usize) < MAX_POOL_BLOCKS && self.0 & (1u64 << id) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = BlockId> {
        (0..MAX_POOL_BLOCKS as BlockId).filter(move |&id| self.contains(id))
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for IdMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl TryFrom<Vec<BlockId>> for IdMask {
    type Error = CatalogError;

    fn try_from(ids: Vec<BlockId>) -> Result<Self, Self::Error> {
        Self::from_ids(&ids)
    }
}

impl From<IdMask> for Vec<BlockId> {
    fn from(mask: IdMask) -> Self {
        mask.iter().collect()
    }
}

/// Layer mixer wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmCaps {
    pub id: BlockId,
    /// Hardwired pingpong; every mixer has one.
    pub pingpong: BlockId,
    #[serde(default)]
    pub dspp: Option<BlockId>,
    #[serde(default)]
    pub ds: Option<BlockId>,
    #[serde(default)]
    pub roi_misr: Option<BlockId>,
    /// Mixers this one may be combined with in multi-mixer topologies.
    #[serde(default)]
    pub peers: IdMask,
    #[serde(default)]
    pub features: LmFeatures,
    pub max_width: u32,
}

impl LmCaps {
    pub fn new(id: BlockId, pingpong: BlockId) -> Self {
        Self {
            id,
            pingpong,
            dspp: None,
            ds: None,
            roi_misr: None,
            peers: IdMask::EMPTY,
            features: LmFeatures::empty(),
            max_width: 2560,
        }
    }

    pub fn dspp(mut self, dspp: BlockId) -> Self {
        self.dspp = Some(dspp);
        self
    }

    pub fn ds(mut self, ds: BlockId) -> Self {
        self.ds = Some(ds);
        self
    }

    pub fn roi_misr(mut self, roi_misr: BlockId) -> Self {
        self.roi_misr = Some(roi_misr);
        self
    }

    pub fn peers(mut self, peers: IdMask) -> Self {
        self.peers = peers;
        self
    }

    pub fn features(mut self, features: LmFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn max_width(mut self, max_width: u32) -> Self {
        self.max_width = max_width;
        self
    }

    pub fn is_primary_pref(&self) -> bool {
        self.features.contains(LmFeatures::PRIMARY_PREF)
    }

    pub fn is_cwb_pref(&self) -> bool {
        self.features.contains(LmFeatures::CWB_PREF)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtlCaps {
    pub id: BlockId,
    #[serde(default)]
    pub features: CtlFeatures,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingpongCaps {
    pub id: BlockId,
    #[serde(default)]
    pub features: PingpongFeatures,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DscCaps {
    pub id: BlockId,
    /// Encoders this one may pair with.
    #[serde(default)]
    pub peers: IdMask,
}

/// Chroma down mux reachability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdmCaps {
    pub id: BlockId,
    #[serde(default)]
    pub intfs: IdMask,
    #[serde(default)]
    pub wbs: IdMask,
}

/// Capability record of one block, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockCaps {
    Lm(LmCaps),
    Ctl(CtlCaps),
    Pingpong(PingpongCaps),
    Dsc(DscCaps),
    Cdm(CdmCaps),
    /// Kinds without wiring of their own (DSPP, DS, INTF, WB, ...).
    Plain { kind: BlockKind, id: BlockId },
}

impl BlockCaps {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockCaps::Lm(_) => BlockKind::Lm,
            BlockCaps::Ctl(_) => BlockKind::Ctl,
            BlockCaps::Pingpong(_) => BlockKind::Pingpong,
            BlockCaps::Dsc(_) => BlockKind::Dsc,
            BlockCaps::Cdm(_) => BlockKind::Cdm,
            BlockCaps::Plain { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> BlockId {
        match self {
            BlockCaps::Lm(c) => c.id,
            BlockCaps::Ctl(c) => c.id,
            BlockCaps::Pingpong(c) => c.id,
            BlockCaps::Dsc(c) => c.id,
            BlockCaps::Cdm(c) => c.id,
            BlockCaps::Plain { id, .. } => *id,
        }
    }
}

/// Catalog validation failures. All are fatal at bring-up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{kind} blocks are not pool managed")]
    NotPoolManaged { kind: BlockKind },
    #[error("duplicate {kind} {id}")]
    DuplicateBlock { kind: BlockKind, id: BlockId },
    #[error("{kind} {id} wired to undeclared {companion} {companion_id}")]
    MissingCompanion {
        kind: BlockKind,
        id: BlockId,
        companion: BlockKind,
        companion_id: BlockId,
    },
    #[error("{companion} {companion_id} wired to both lm {first} and lm {second}")]
    SharedCompanion {
        companion: BlockKind,
        companion_id: BlockId,
        first: BlockId,
        second: BlockId,
    },
    #[error("{kind} {id} lists {peer} as peer but not the reverse")]
    AsymmetricPeers {
        kind: BlockKind,
        id: BlockId,
        peer: BlockId,
    },
    #[error("lm {id} has zero max width")]
    ZeroWidth { id: BlockId },
    #[error("id {id} does not fit a 64-bit mask")]
    IdOutOfRange { id: BlockId },
    #[error("{count} pool blocks exceed the limit of {max}")]
    TooManyBlocks { count: usize, max: usize },
}

/// Validated, immutable hardware catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    ctl_version: CtlVersion,
    roi_misr_dsc_shared: bool,
    blocks: Vec<BlockCaps>,
    index: HashMap<(BlockKind, BlockId), usize>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn ctl_version(&self) -> CtlVersion {
        self.ctl_version
    }

    /// DSC encoders share the ROI-MISR id space and are reserved together
    /// with their mixer.
    pub fn roi_misr_dsc_shared(&self) -> bool {
        self.roi_misr_dsc_shared
    }

    pub fn has_roi_misr(&self) -> bool {
        self.block_count(BlockKind::RoiMisr) > 0
    }

    /// All blocks in declaration order, grouped by kind.
    pub fn blocks(&self) -> &[BlockCaps] {
        &self.blocks
    }

    pub fn block_count(&self, kind: BlockKind) -> usize {
        self.blocks.iter().filter(|b| b.kind() == kind).count()
    }

    pub fn ids(&self, kind: BlockKind) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .filter(move |b| b.kind() == kind)
            .map(BlockCaps::id)
    }

    pub fn contains(&self, kind: BlockKind, id: BlockId) -> bool {
        self.index.contains_key(&(kind, id))
    }

    pub fn caps(&self, kind: BlockKind, id: BlockId) -> Option<&BlockCaps> {
        self.index.get(&(kind, id)).map(|&i| &self.blocks[i])
    }

    pub fn lm(&self, id: BlockId) -> Option<&LmCaps> {
        match self.caps(BlockKind::Lm, id)? {
            BlockCaps::Lm(c) => Some(c),
            _ => None,
        }
    }

    pub fn ctl(&self, id: BlockId) -> Option<&CtlCaps> {
        match self.caps(BlockKind::Ctl, id)? {
            BlockCaps::Ctl(c) => Some(c),
            _ => None,
        }
    }

    pub fn pingpong(&self, id: BlockId) -> Option<&PingpongCaps> {
        match self.caps(BlockKind::Pingpong, id)? {
            BlockCaps::Pingpong(c) => Some(c),
            _ => None,
        }
    }

    pub fn dsc(&self, id: BlockId) -> Option<&DscCaps> {
        match self.caps(BlockKind::Dsc, id)? {
            BlockCaps::Dsc(c) => Some(c),
            _ => None,
        }
    }

    pub fn cdm(&self, id: BlockId) -> Option<&CdmCaps> {
        match self.caps(BlockKind::Cdm, id)? {
            BlockCaps::Cdm(c) => Some(c),
            _ => None,
        }
    }

    pub fn lms(&self) -> impl Iterator<Item = &LmCaps> {
        self.blocks.iter().filter_map(|b| match b {
            BlockCaps::Lm(c) => Some(c),
            _ => None,
        })
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.blocks.len() >= MAX_POOL_BLOCKS {
            return Err(CatalogError::TooManyBlocks {
                count: self.blocks.len(),
                max: MAX_POOL_BLOCKS - 1,
            });
        }

        // Ids that end up in peer or reachability masks must fit one.
        for block in &self.blocks {
            let masked = matches!(
                block.kind(),
                BlockKind::Lm | BlockKind::Dsc | BlockKind::Intf | BlockKind::Wb
            );
            if masked && block.id() as usize >= MAX_POOL_BLOCKS {
                return Err(CatalogError::IdOutOfRange { id: block.id() });
            }
        }

        let mut owners: BTreeMap<(BlockKind, BlockId), BlockId> = BTreeMap::new();
        for lm in self.lms() {
            if lm.max_width == 0 {
                return Err(CatalogError::ZeroWidth { id: lm.id });
            }

            let companions = [
                Some((BlockKind::Pingpong, lm.pingpong)),
                lm.dspp.map(|id| (BlockKind::Dspp, id)),
                lm.ds.map(|id| (BlockKind::Ds, id)),
                lm.roi_misr.map(|id| (BlockKind::RoiMisr, id)),
                // Shared hardware drives the encoder with the same id.
                lm.roi_misr
                    .filter(|_| self.roi_misr_dsc_shared)
                    .map(|id| (BlockKind::Dsc, id)),
            ];
            for (companion, companion_id) in companions.into_iter().flatten() {
                if !self.contains(companion, companion_id) {
                    return Err(CatalogError::MissingCompanion {
                        kind: BlockKind::Lm,
                        id: lm.id,
                        companion,
                        companion_id,
                    });
                }
                if let Some(&first) = owners.get(&(companion, companion_id)) {
                    return Err(CatalogError::SharedCompanion {
                        companion,
                        companion_id,
                        first,
                        second: lm.id,
                    });
                }
                owners.insert((companion, companion_id), lm.id);
            }

            for peer in lm.peers.iter().filter(|&p| p != lm.id) {
                let symmetric = self.lm(peer).is_some_and(|p| p.peers.contains(lm.id));
                if !symmetric {
                    return Err(CatalogError::AsymmetricPeers {
                        kind: BlockKind::Lm,
                        id: lm.id,
                        peer,
                    });
                }
            }
        }

        for block in &self.blocks {
            let BlockCaps::Dsc(dsc) = block else {
                continue;
            };
            for peer in dsc.peers.iter().filter(|&p| p != dsc.id) {
                let symmetric = self.dsc(peer).is_some_and(|p| p.peers.contains(dsc.id));
                if !symmetric {
                    return Err(CatalogError::AsymmetricPeers {
                        kind: BlockKind::Dsc,
                        id: dsc.id,
                        peer,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Builder for [`Catalog`].
///
/// Blocks keep their declaration order, which is also the order the
/// reservation engine searches them in.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    ctl_version: CtlVersion,
    roi_misr_dsc_shared: bool,
    blocks: Vec<BlockCaps>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ctl_version(mut self, version: CtlVersion) -> Self {
        self.ctl_version = version;
        self
    }

    pub fn roi_misr_dsc_shared(mut self, shared: bool) -> Self {
        self.roi_misr_dsc_shared = shared;
        self
    }

    pub fn lm(mut self, caps: LmCaps) -> Self {
        self.blocks.push(BlockCaps::Lm(caps));
        self
    }

    pub fn ctl(mut self, id: BlockId, features: CtlFeatures) -> Self {
        self.blocks.push(BlockCaps::Ctl(CtlCaps { id, features }));
        self
    }

    pub fn pingpong(mut self, id: BlockId, features: PingpongFeatures) -> Self {
        self.blocks
            .push(BlockCaps::Pingpong(PingpongCaps { id, features }));
        self
    }

    pub fn dsc(mut self, id: BlockId, peers: IdMask) -> Self {
        self.blocks.push(BlockCaps::Dsc(DscCaps { id, peers }));
        self
    }

    pub fn cdm(mut self, id: BlockId, intfs: IdMask, wbs: IdMask) -> Self {
        self.blocks.push(BlockCaps::Cdm(CdmCaps { id, intfs, wbs }));
        self
    }

    /// Declare a block kind without wiring of its own (DSPP, DS, INTF, WB,
    /// ROI-MISR, rotator, QDSS).
    pub fn block(mut self, kind: BlockKind, id: BlockId) -> Self {
        self.blocks.push(match kind {
            BlockKind::Lm => BlockCaps::Lm(LmCaps::new(id, id)),
            BlockKind::Ctl => BlockCaps::Ctl(CtlCaps {
                id,
                features: CtlFeatures::empty(),
            }),
            BlockKind::Pingpong => BlockCaps::Pingpong(PingpongCaps {
                id,
                features: PingpongFeatures::empty(),
            }),
            BlockKind::Dsc => BlockCaps::Dsc(DscCaps {
                id,
                peers: IdMask::EMPTY,
            }),
            BlockKind::Cdm => BlockCaps::Cdm(CdmCaps {
                id,
                intfs: IdMask::EMPTY,
                wbs: IdMask::EMPTY,
            }),
            kind => BlockCaps::Plain { kind, id },
        });
        self
    }

    pub fn blocks(self, kind: BlockKind, ids: impl IntoIterator<Item = BlockId>) -> Self {
        ids.into_iter().fold(self, |b, id| b.block(kind, id))
    }

    /// Validate the wiring and produce the catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let mut blocks = self.blocks;
        // Group by kind, keeping declaration order inside each kind.
        blocks.sort_by_key(BlockCaps::kind);

        let mut index = HashMap::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            let kind = block.kind();
            if !kind.is_pool_managed() {
                return Err(CatalogError::NotPoolManaged { kind });
            }
            if index.insert((kind, block.id()), i).is_some() {
                return Err(CatalogError::DuplicateBlock { kind, id: block.id() });
            }
        }

        let catalog = Catalog {
            ctl_version: self.ctl_version,
            roi_misr_dsc_shared: self.roi_misr_dsc_shared,
            blocks,
            index,
        };
        catalog.validate()?;

        tracing::debug!(
            blocks = catalog.blocks.len(),
            ctl_version = ?catalog.ctl_version,
            roi_misr_dsc_shared = catalog.roi_misr_dsc_shared,
            "catalog built"
        );
        Ok(catalog)
    }
}
