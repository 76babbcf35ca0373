// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Uuid-indexed set of pool blocks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::MAX_POOL_BLOCKS;

/// Blocks touched by a consumer, one bit per pool uuid.
///
/// Used to detect conflicts between consumers that share one atomic commit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceMask(u64);

impl ResourceMask {
    pub const EMPTY: ResourceMask = ResourceMask(0);

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn insert(&mut self, uuid: u8) {
        debug_assert!((uuid as usize) < MAX_POOL_BLOCKS);
        self.0 |= 1u64 << uuid;
    }

    pub fn contains(self, uuid: u8) -> bool {
        (uuid as usize) < MAX_POOL_BLOCKS && self.0 & (1u64 << uuid) != 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn uuids(self) -> impl Iterator<Item = u8> {
        (0..MAX_POOL_BLOCKS as u8).filter(move |&uuid| self.contains(uuid))
    }
}

impl fmt::Debug for ResourceMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceMask({:#018x})", self.0)
    }
}

impl FromIterator<u8> for ResourceMask {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut mask = ResourceMask::EMPTY;
        for uuid in iter {
            mask.insert(uuid);
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_set_ops() {
        let a: ResourceMask = [0u8, 3, 63].into_iter().collect();
        let b: ResourceMask = [3u8, 4].into_iter().collect();

        assert_eq!(a.count(), 3);
        assert!(a.contains(63));
        assert!(!a.contains(64));
        assert!(a.intersects(b));
        assert_eq!(a.union(b).count(), 4);
        assert_eq!(a.uuids().collect::<Vec<_>>(), vec![0, 3, 63]);
        assert!(!a.intersects(ResourceMask::from_bits(1 << 1)));
        assert!(ResourceMask::EMPTY.is_empty());
    }
}
