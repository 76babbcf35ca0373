// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Shared test fixtures for catalog, pool, engine and manager tests.
//!
//! Usable by downstream crates through the `testing` feature.

mod catalogs;
mod managers;

pub use catalogs::{
    UniformCatalogSetup, UniformCatalogSetupBuilder, legacy_catalog, quad_misr_catalog,
    two_mixer_catalog,
};
pub use managers::{create_test_manager, create_test_manager_with_config, requirements};

use crate::catalog::IdMask;
use crate::{BlockId, ConsumerId};

/// Id mask from a literal list. Panics on ids above 63.
pub fn ids(list: &[BlockId]) -> IdMask {
    IdMask::from_ids(list).expect("ids below 64")
}

/// Consumer `enc{n}`. Panics on zero.
pub fn consumer(n: u32) -> ConsumerId {
    ConsumerId::new(n).expect("non-zero consumer id")
}
