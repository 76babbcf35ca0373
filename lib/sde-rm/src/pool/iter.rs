// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Lazy, restartable iteration over pool blocks of one kind.

use std::borrow::Borrow;

use super::{HwBlock, ReservationState};
use crate::{BlockKind, ConsumerId};

/// Which reservation owners an iteration yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterFilter {
    /// Unreserved blocks only.
    Free,
    /// Unreserved blocks plus those already held by the consumer.
    FreeOrOwnedBy(ConsumerId),
    /// Blocks held by the consumer.
    OwnedBy(ConsumerId),
    All,
}

impl IterFilter {
    pub fn accepts(self, owner: Option<ConsumerId>) -> bool {
        match self {
            IterFilter::Free => owner.is_none(),
            IterFilter::FreeOrOwnedBy(c) => owner.is_none() || owner == Some(c),
            IterFilter::OwnedBy(c) => owner == Some(c),
            IterFilter::All => true,
        }
    }
}

impl From<Option<ConsumerId>> for IterFilter {
    fn from(consumer: Option<ConsumerId>) -> Self {
        match consumer {
            Some(c) => IterFilter::FreeOrOwnedBy(c),
            None => IterFilter::Free,
        }
    }
}

/// Iterator over the blocks of one kind in a [`ReservationState`], in pool
/// order.
///
/// Works over a borrowed state inside a transaction or over a shared
/// `Arc<ReservationState>` handed out to readers.
#[derive(Debug, Clone)]
pub struct HwIter<S> {
    state: S,
    kind: BlockKind,
    filter: IterFilter,
    pos: usize,
}

impl<S: Borrow<ReservationState>> HwIter<S> {
    pub fn new(state: S, kind: BlockKind, filter: IterFilter) -> Self {
        Self {
            state,
            kind,
            filter,
            pos: 0,
        }
    }

    /// Rewind to the first block.
    pub fn restart(&mut self) {
        self.pos = 0;
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }
}

impl<S: Borrow<ReservationState>> Iterator for HwIter<S> {
    type Item = HwBlock;

    fn next(&mut self) -> Option<HwBlock> {
        let entries = self.state.borrow().entries();
        while let Some(entry) = entries.get(self.pos) {
            self.pos += 1;
            if entry.kind() == self.kind && self.filter.accepts(entry.reserved_by()) {
                return Some(entry.view());
            }
        }
        None
    }
}
