// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Raw atomic counters and gauges for one resource manager.
//!
//! All increment methods use `Ordering::Relaxed`; the [`MetricsAggregator`](super::MetricsAggregator)
//! reads these atomics at scrape time.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Raw atomic metrics for a single [`ResourceManager`](crate::ResourceManager).
///
/// Counters are monotonically increasing `AtomicU64`.
/// Gauges are bidirectional `AtomicI64`.
#[derive(Debug)]
pub struct RmMetrics {
    label: String,

    // Counters (monotonic)
    reservations: AtomicU64,
    reservation_failures: AtomicU64,
    releases: AtomicU64,
    commits: AtomicU64,
    discards: AtomicU64,
    external_injections: AtomicU64,

    // Gauges
    reserved_blocks: AtomicI64,
}

impl RmMetrics {
    /// Create metrics labelled with the display controller they belong to
    /// (e.g. `"mdss0"`).
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            reservations: AtomicU64::new(0),
            reservation_failures: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            discards: AtomicU64::new(0),
            external_injections: AtomicU64::new(0),
            reserved_blocks: AtomicI64::new(0),
        }
    }

    #[inline(always)]
    pub fn label(&self) -> &str {
        &self.label
    }

    // ---- Counter increments ----

    #[inline(always)]
    pub fn inc_reservations(&self) {
        self.reservations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_reservation_failures(&self) {
        self.reservation_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_releases(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_discards(&self) {
        self.discards.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_external_injections(&self) {
        self.external_injections.fetch_add(1, Ordering::Relaxed);
    }

    // ---- Gauge operations ----

    #[inline(always)]
    pub fn set_reserved_blocks(&self, count: i64) {
        self.reserved_blocks.store(count, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reservations: self.reservations.load(Ordering::Relaxed),
            reservation_failures: self.reservation_failures.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
            external_injections: self.external_injections.load(Ordering::Relaxed),
            reserved_blocks: self.reserved_blocks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of all atomic metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub reservations: u64,
    pub reservation_failures: u64,
    pub releases: u64,
    pub commits: u64,
    pub discards: u64,
    pub external_injections: u64,
    pub reserved_blocks: i64,
}
