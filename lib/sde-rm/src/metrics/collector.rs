// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Custom `prometheus::core::Collector` that reads raw atomics at scrape time.
//!
//! External labels (e.g. `instance_id`) are appended at collection time,
//! not baked in at metric creation time.

use std::sync::Arc;

use parking_lot::RwLock;
use prometheus::core::{Collector, Desc};
use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};

use super::rm_metrics::{MetricsSnapshot, RmMetrics};

/// Metric definitions: (name, help).
const COUNTER_DEFS: &[(&str, &str)] = &[
    ("sde_rm_reservations_total", "Total successful reservations"),
    (
        "sde_rm_reservation_failures_total",
        "Total reservations rejected by the engine",
    ),
    ("sde_rm_releases_total", "Total consumer releases"),
    ("sde_rm_commits_total", "Total reservation states committed"),
    (
        "sde_rm_discards_total",
        "Total transactions dropped without commit",
    ),
    (
        "sde_rm_external_injections_total",
        "Total externally created blocks injected into the pool",
    ),
];

const GAUGE_DEFS: &[(&str, &str)] = &[(
    "sde_rm_reserved_blocks",
    "Pool blocks reserved in the committed state",
)];

const LABEL: &str = "controller";

fn counter_values(snap: &MetricsSnapshot) -> [u64; 6] {
    [
        snap.reservations,
        snap.reservation_failures,
        snap.releases,
        snap.commits,
        snap.discards,
        snap.external_injections,
    ]
}

/// Aggregates metrics from multiple [`RmMetrics`] sources and exports them as
/// Prometheus `MetricFamily` protos with a per-controller label.
#[derive(Clone)]
pub struct MetricsAggregator {
    inner: Arc<Inner>,
}

struct Inner {
    sources: RwLock<Vec<Arc<RmMetrics>>>,
    external_labels: RwLock<Vec<(String, String)>>,
    descs: Vec<Desc>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        let descs = COUNTER_DEFS
            .iter()
            .chain(GAUGE_DEFS)
            .filter_map(|(name, help)| {
                Desc::new(
                    name.to_string(),
                    help.to_string(),
                    vec![LABEL.to_string()],
                    Default::default(),
                )
                .map_err(|err| tracing::warn!(metric = name, %err, "invalid metric description"))
                .ok()
            })
            .collect();

        Self {
            inner: Arc::new(Inner {
                sources: RwLock::new(Vec::new()),
                external_labels: RwLock::new(Vec::new()),
                descs,
            }),
        }
    }

    /// Register an [`RmMetrics`] source (called by `ResourceManagerBuilder::build()`).
    pub fn register_source(&self, source: Arc<RmMetrics>) {
        self.inner.sources.write().push(source);
    }

    /// Set external labels appended at scrape time.
    pub fn set_external_labels(&self, labels: Vec<(String, String)>) {
        *self.inner.external_labels.write() = labels;
    }

    /// Register this collector with a `prometheus::Registry`.
    pub fn register_with(&self, registry: &prometheus::Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.clone()))
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn label_pair(name: &str, value: &str) -> LabelPair {
    let mut lp = LabelPair::default();
    lp.set_name(name.to_string());
    lp.set_value(value.to_string());
    lp
}

fn family(name: &str, help: &str, kind: MetricType, metric: Metric) -> MetricFamily {
    let mut mf = MetricFamily::default();
    mf.set_name(name.to_string());
    mf.set_help(help.to_string());
    mf.set_field_type(kind);
    mf.set_metric(vec![metric]);
    mf
}

impl Collector for MetricsAggregator {
    fn desc(&self) -> Vec<&Desc> {
        self.inner.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let sources = self.inner.sources.read();
        let ext_labels = self.inner.external_labels.read();

        let mut families: Vec<MetricFamily> = Vec::new();

        for source in sources.iter() {
            let snap = source.snapshot();

            let mut labels = Vec::with_capacity(1 + ext_labels.len());
            labels.push(label_pair(LABEL, source.label()));
            labels.extend(ext_labels.iter().map(|(k, v)| label_pair(k, v)));

            for ((name, help), value) in COUNTER_DEFS.iter().zip(counter_values(&snap)) {
                let mut m = Metric::default();
                m.set_label(labels.clone());
                let mut c = Counter::default();
                c.set_value(value as f64);
                m.set_counter(c);
                families.push(family(name, help, MetricType::COUNTER, m));
            }

            for ((name, help), value) in GAUGE_DEFS.iter().zip([snap.reserved_blocks]) {
                let mut m = Metric::default();
                m.set_label(labels.clone());
                let mut g = Gauge::default();
                g.set_value(value as f64);
                m.set_gauge(g);
                families.push(family(name, help, MetricType::GAUGE, m));
            }
        }

        // Merge families with the same name (when multiple sources)
        if sources.len() > 1 {
            let mut merged: Vec<MetricFamily> = Vec::new();
            for mut family in families {
                if let Some(existing) = merged.iter_mut().find(|f| f.name() == family.name()) {
                    existing.mut_metric().extend(family.take_metric());
                } else {
                    merged.push(family);
                }
            }
            merged
        } else {
            families
        }
    }
}
