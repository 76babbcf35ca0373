// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Builder for [`ResourceManager`](super::ResourceManager).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::Catalog;
use crate::config::RmConfig;
use crate::error::RmError;
use crate::metrics::{MetricsAggregator, RmMetrics};
use crate::pool::HwPool;
use crate::topology::TopologyTable;

use super::ResourceManager;

/// Error types for [`ResourceManager`] builder validation.
#[derive(Debug, thiserror::Error)]
pub enum RmBuilderError {
    #[error("Builder validation failed: {0}")]
    ValidationError(String),
    #[error("Block pool creation failed: {0}")]
    Pool(#[from] RmError),
}

/// Builder for [`ResourceManager`].
///
/// Construct via [`ResourceManager::builder()`] and finish with [`build()`](Self::build).
#[derive(Default)]
pub struct ResourceManagerBuilder {
    /// Static description of the chip
    catalog: Option<Arc<Catalog>>,

    /// Search policy and relaxation passes
    /// Default: [`RmConfig::default`]
    config: Option<RmConfig>,

    /// Label for this manager's metrics
    /// Default: "mdss0"
    metrics_label: Option<String>,

    /// Optional metrics aggregator for prometheus export
    aggregator: Option<MetricsAggregator>,
}

impl ResourceManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hardware catalog. Accepts an owned or shared catalog.
    pub fn catalog(mut self, catalog: impl Into<Arc<Catalog>>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn config(mut self, config: RmConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Label metrics with the display controller this manager drives.
    pub fn metrics_label(mut self, label: impl Into<String>) -> Self {
        self.metrics_label = Some(label.into());
        self
    }

    /// Set a metrics aggregator for prometheus export.
    ///
    /// The aggregator will automatically receive this manager's metrics source.
    pub fn aggregator(mut self, aggregator: MetricsAggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    fn validate(&self) -> Result<(), String> {
        self.catalog.as_ref().ok_or("catalog is required")?;

        if let Some(label) = &self.metrics_label
            && label.is_empty()
        {
            return Err("metrics_label must not be empty".to_string());
        }

        Ok(())
    }

    /// Build the [`ResourceManager`].
    ///
    /// Selects the topology table from the catalog's CTL protocol and creates
    /// the block pool with every block free.
    pub fn build(self) -> Result<ResourceManager, RmBuilderError> {
        self.validate().map_err(RmBuilderError::ValidationError)?;

        let catalog = self
            .catalog
            .ok_or_else(|| RmBuilderError::ValidationError("catalog is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        let label = self.metrics_label.unwrap_or_else(|| "mdss0".to_string());

        let topology = TopologyTable::for_version(catalog.ctl_version());
        let pool = HwPool::new(catalog)?;

        let metrics = Arc::new(RmMetrics::new(label));
        if let Some(aggregator) = &self.aggregator {
            aggregator.register_source(metrics.clone());
        }

        tracing::info!(
            ctl_version = ?topology.version(),
            peer_search = %config.peer_search,
            lm_relaxation = config.lm_relaxation,
            ctl_split_relaxation = config.ctl_split_relaxation,
            blocks = pool.current().entries().len(),
            "resource manager ready"
        );

        Ok(ResourceManager {
            pool,
            topology,
            config,
            metrics,
            writer: Mutex::new(()),
        })
    }
}
