// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Test manager creation helpers.

use crate::catalog::Catalog;
use crate::config::RmConfig;
use crate::engine::{HwResources, ReservationRequirements, TopologyControl};
use crate::manager::ResourceManager;
use crate::topology::TopologyName;

/// Manager over `catalog` with the default configuration.
pub fn create_test_manager(catalog: Catalog) -> ResourceManager {
    create_test_manager_with_config(catalog, RmConfig::default())
}

pub fn create_test_manager_with_config(catalog: Catalog, config: RmConfig) -> ResourceManager {
    ResourceManager::builder()
        .catalog(catalog)
        .config(config)
        .build()
        .expect("Should build manager")
}

/// Requirements for `name` on `manager`'s topology table.
pub fn requirements(
    manager: &ResourceManager,
    name: TopologyName,
    hw: HwResources,
    controls: TopologyControl,
) -> ReservationRequirements {
    ReservationRequirements::for_topology(name, hw, controls, manager.topology_table())
}
