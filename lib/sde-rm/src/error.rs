// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Error types returned by the reservation engine and the block pool.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::ConsumerId;
use crate::topology::TopologyName;

/// Result type for reservation operations.
pub type Result<T> = std::result::Result<T, RmError>;

/// Reservation step that could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Stage {
    Mixers,
    PingpongSlave,
    Ctl,
    Intf,
    Cdm,
    Dsc,
    Qdss,
}

/// Errors that can occur while building the pool or reserving blocks.
#[derive(Debug, Error)]
pub enum RmError {
    /// No combination of free blocks meets the topology. The committed state
    /// is unchanged; the caller may retry later or request a smaller topology.
    #[error("{consumer}: no free blocks satisfy {topology} at stage {stage}")]
    Unsatisfiable {
        consumer: ConsumerId,
        stage: Stage,
        topology: TopologyName,
    },

    /// A block id fixed at probe time is owned elsewhere, or the catalog
    /// contradicts itself at runtime.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// Bookkeeping capacity exceeded (uuid space).
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl RmError {
    /// Only [`RmError::Unsatisfiable`] is worth retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RmError::Unsatisfiable { .. })
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            RmError::Unsatisfiable { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
