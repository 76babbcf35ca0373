// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Reservation engine tuning.
//!
//! Provides environment-based configuration for the search policy and the
//! relaxation passes.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How far the mixer and DSC searches backtrack after a failed peer pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PeerSearch {
    /// Undo the current primary pick and advance to the next primary. Peers
    /// are taken greedily in catalog order, so some satisfiable requests are
    /// rejected.
    #[default]
    Narrow,
    /// Try every ordering of peers for every primary.
    Exhaustive,
}

#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(pattern = "owned")]
pub struct RmConfig {
    #[builder(default)]
    pub peer_search: PeerSearch,

    /// Retry the mixer search accepting unrequested DSPP, then DS companions.
    #[builder(default = "true")]
    pub lm_relaxation: bool,

    /// Retry the CTL search with split display forced on.
    #[builder(default = "true")]
    pub ctl_split_relaxation: bool,
}

impl Default for RmConfig {
    fn default() -> Self {
        Self {
            peer_search: PeerSearch::Narrow,
            lm_relaxation: true,
            ctl_split_relaxation: true,
        }
    }
}

impl RmConfig {
    pub fn builder() -> RmConfigBuilder {
        RmConfigBuilder::default()
    }

    /// Create config from environment variables
    ///
    /// # Environment Variables
    ///
    /// - `SDE_RM_PEER_SEARCH`: `narrow` or `exhaustive` (default: narrow)
    /// - `SDE_RM_LM_RELAXATION`: mixer relaxation passes (default: true)
    /// - `SDE_RM_CTL_SPLIT_RELAXATION`: CTL split relaxation (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let peer_search = match lookup("SDE_RM_PEER_SEARCH") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "unknown SDE_RM_PEER_SEARCH, using narrow");
                PeerSearch::Narrow
            }),
            None => defaults.peer_search,
        };

        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(default)
        };

        Self {
            peer_search,
            lm_relaxation: flag("SDE_RM_LM_RELAXATION", defaults.lm_relaxation),
            ctl_split_relaxation: flag(
                "SDE_RM_CTL_SPLIT_RELAXATION",
                defaults.ctl_split_relaxation,
            ),
        }
    }
}
