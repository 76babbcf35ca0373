// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Serializable catalog description.
//!
//! Firmware tables or device-tree parsers hand the resource manager a flat
//! description of the hardware. [`CatalogDescription`] is that description in
//! serde form; [`CatalogDescription::into_catalog`] validates it.
//!
//! ```json
//! {
//!   "ctl_version": "v1",
//!   "mixers": [
//!     { "id": 0, "pingpong": 0, "dspp": 0, "peers": [1], "max_width": 2560 },
//!     { "id": 1, "pingpong": 1, "dspp": 1, "peers": [0], "max_width": 2560 }
//!   ],
//!   "ctls": [{ "id": 0, "features": "SPLIT_DISPLAY" }],
//!   "pingpongs": [{ "id": 0 }, { "id": 1 }],
//!   "dspps": [0, 1],
//!   "intfs": [1, 2]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    BlockCaps, Catalog, CatalogError, CdmCaps, CtlCaps, CtlVersion, DscCaps, LmCaps, PingpongCaps,
};
use crate::{BlockId, BlockKind};

/// Errors loading a catalog description.
#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed catalog description: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] CatalogError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogDescription {
    pub ctl_version: CtlVersion,
    pub roi_misr_dsc_shared: bool,
    pub mixers: Vec<LmCaps>,
    pub ctls: Vec<CtlCaps>,
    pub pingpongs: Vec<PingpongCaps>,
    pub dscs: Vec<DscCaps>,
    pub cdms: Vec<CdmCaps>,
    pub dspps: Vec<BlockId>,
    pub dest_scalers: Vec<BlockId>,
    pub intfs: Vec<BlockId>,
    pub wbs: Vec<BlockId>,
    pub roi_misrs: Vec<BlockId>,
    pub rotators: Vec<BlockId>,
    pub qdss: Vec<BlockId>,
}

impl CatalogDescription {
    pub fn from_json_str(json: &str) -> Result<Self, DescriptionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DescriptionError> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn to_json_string(&self) -> Result<String, DescriptionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate and build the catalog.
    pub fn into_catalog(self) -> Result<Catalog, DescriptionError> {
        let plain = [
            (BlockKind::Dspp, self.dspps),
            (BlockKind::Ds, self.dest_scalers),
            (BlockKind::Intf, self.intfs),
            (BlockKind::Wb, self.wbs),
            (BlockKind::RoiMisr, self.roi_misrs),
            (BlockKind::Rot, self.rotators),
            (BlockKind::Qdss, self.qdss),
        ];

        let mut builder = Catalog::builder()
            .ctl_version(self.ctl_version)
            .roi_misr_dsc_shared(self.roi_misr_dsc_shared);
        builder.blocks.extend(self.mixers.into_iter().map(BlockCaps::Lm));
        builder.blocks.extend(self.ctls.into_iter().map(BlockCaps::Ctl));
        builder
            .blocks
            .extend(self.pingpongs.into_iter().map(BlockCaps::Pingpong));
        builder.blocks.extend(self.dscs.into_iter().map(BlockCaps::Dsc));
        builder.blocks.extend(self.cdms.into_iter().map(BlockCaps::Cdm));
        for (kind, ids) in plain {
            builder = builder.blocks(kind, ids);
        }

        Ok(builder.build()?)
    }
}

impl From<&Catalog> for CatalogDescription {
    fn from(catalog: &Catalog) -> Self {
        let mut desc = CatalogDescription {
            ctl_version: catalog.ctl_version(),
            roi_misr_dsc_shared: catalog.roi_misr_dsc_shared(),
            ..Default::default()
        };

        for block in catalog.blocks() {
            match block {
                BlockCaps::Lm(c) => desc.mixers.push(c.clone()),
                BlockCaps::Ctl(c) => desc.ctls.push(c.clone()),
                BlockCaps::Pingpong(c) => desc.pingpongs.push(c.clone()),
                BlockCaps::Dsc(c) => desc.dscs.push(c.clone()),
                BlockCaps::Cdm(c) => desc.cdms.push(c.clone()),
                BlockCaps::Plain { kind, id } => {
                    let list = match kind {
                        BlockKind::Dspp => &mut desc.dspps,
                        BlockKind::Ds => &mut desc.dest_scalers,
                        BlockKind::Intf => &mut desc.intfs,
                        BlockKind::Wb => &mut desc.wbs,
                        BlockKind::RoiMisr => &mut desc.roi_misrs,
                        BlockKind::Rot => &mut desc.rotators,
                        BlockKind::Qdss => &mut desc.qdss,
                        _ => continue,
                    };
                    list.push(*id);
                }
            }
        }

        desc
    }
}
