// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics for reservation observability.
//!
//! Architecture:
//! - [`RmMetrics`]: Raw `AtomicU64`/`AtomicI64` counters and gauges, bumped by transactions.
//! - [`MetricsAggregator`]: Custom `prometheus::core::Collector` that reads atomics at scrape time.

mod collector;
mod rm_metrics;

pub use collector::MetricsAggregator;
pub use rm_metrics::{MetricsSnapshot, RmMetrics};
