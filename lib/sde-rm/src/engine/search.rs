// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Primary/peer search shared by the mixer and DSC steps.
//!
//! A search picks `count` blocks: a primary, then peers drawn from the
//! primary's peer mask. Each pick claims the block (and whatever companions
//! the [`Picker`] decides on) in the trial state, recording the previous
//! owner in an [`UndoLog`] so a failed round can be rolled back exactly.

use crate::catalog::IdMask;
use crate::config::PeerSearch;
use crate::pool::ReservationState;
use crate::{BlockId, ConsumerId};

/// Previous owners of every pool entry claimed during one reservation.
#[derive(Debug, Default)]
pub(crate) struct UndoLog {
    entries: Vec<(usize, Option<ConsumerId>)>,
}

impl UndoLog {
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    pub fn claim(&mut self, state: &mut ReservationState, pos: usize, consumer: ConsumerId) {
        let prev = state.set_owner(pos, Some(consumer));
        self.entries.push((pos, prev));
    }

    /// Restore every claim made after `mark`, newest first.
    pub fn rollback(&mut self, state: &mut ReservationState, mark: usize) {
        while self.entries.len() > mark {
            if let Some((pos, prev)) = self.entries.pop() {
                state.set_owner(pos, prev);
            }
        }
    }

    pub fn touched(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|&(pos, _)| pos)
    }
}

/// Eligibility and claiming for one block kind.
pub(crate) trait Picker {
    /// Candidate ids in search order.
    fn candidates(&self) -> Vec<BlockId>;

    fn peers_of(&self, id: BlockId) -> IdMask;

    /// Check `id` for assignment slot `slot` and claim it with its
    /// companions. Claims nothing when it returns `false`.
    fn try_pick(
        &self,
        state: &mut ReservationState,
        undo: &mut UndoLog,
        id: BlockId,
        slot: usize,
    ) -> bool;
}

/// Pick `count` blocks through `picker`.
///
/// With `pinned` the ids are taken strictly in the given order: the first is
/// the primary and the list must cover `count`. On `None` nothing stays
/// claimed.
pub(crate) fn search<P: Picker>(
    picker: &P,
    state: &mut ReservationState,
    undo: &mut UndoLog,
    count: usize,
    policy: PeerSearch,
    pinned: Option<&[BlockId]>,
) -> Option<Vec<BlockId>> {
    if count == 0 {
        return Some(Vec::new());
    }

    if let Some(pins) = pinned {
        return search_pinned(picker, state, undo, count, pins);
    }

    let candidates = picker.candidates();
    for &primary in &candidates {
        let mark = undo.mark();
        if !picker.try_pick(state, undo, primary, 0) {
            continue;
        }

        let mut picks = vec![primary];
        let found = match policy {
            PeerSearch::Narrow => {
                peers_greedy(picker, state, undo, &candidates, &mut picks, count)
            }
            PeerSearch::Exhaustive => {
                peers_backtrack(picker, state, undo, &candidates, &mut picks, count)
            }
        };
        if found {
            return Some(picks);
        }

        tracing::debug!(primary, found = picks.len(), count, "not enough peers, rolling back primary");
        undo.rollback(state, mark);
    }

    None
}

fn search_pinned<P: Picker>(
    picker: &P,
    state: &mut ReservationState,
    undo: &mut UndoLog,
    count: usize,
    pins: &[BlockId],
) -> Option<Vec<BlockId>> {
    if pins.len() < count {
        tracing::debug!(pinned = pins.len(), count, "too few pinned ids");
        return None;
    }

    let mark = undo.mark();
    for (slot, &id) in pins[..count].iter().enumerate() {
        if !picker.try_pick(state, undo, id, slot) {
            tracing::debug!(id, slot, "pinned block not eligible");
            undo.rollback(state, mark);
            return None;
        }
    }
    Some(pins[..count].to_vec())
}

/// Depth-1 search: peers in catalog order, first fit wins.
fn peers_greedy<P: Picker>(
    picker: &P,
    state: &mut ReservationState,
    undo: &mut UndoLog,
    candidates: &[BlockId],
    picks: &mut Vec<BlockId>,
    count: usize,
) -> bool {
    let peers = picker.peers_of(picks[0]);
    for &id in candidates {
        if picks.len() == count {
            break;
        }
        if picks.contains(&id) || !peers.contains(id) {
            continue;
        }
        if picker.try_pick(state, undo, id, picks.len()) {
            picks.push(id);
        }
    }
    picks.len() == count
}

/// Full backtracking over peer orderings; slot parity matters to pickers.
fn peers_backtrack<P: Picker>(
    picker: &P,
    state: &mut ReservationState,
    undo: &mut UndoLog,
    candidates: &[BlockId],
    picks: &mut Vec<BlockId>,
    count: usize,
) -> bool {
    if picks.len() == count {
        return true;
    }

    let peers = picker.peers_of(picks[0]);
    for &id in candidates {
        if picks.contains(&id) || !peers.contains(id) {
            continue;
        }
        let mark = undo.mark();
        if !picker.try_pick(state, undo, id, picks.len()) {
            continue;
        }
        picks.push(id);
        if peers_backtrack(picker, state, undo, candidates, picks, count) {
            return true;
        }
        picks.pop();
        undo.rollback(state, mark);
    }
    false
}
