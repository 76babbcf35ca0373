// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Catalog fixtures.

use derive_builder::Builder;

use crate::BlockKind;
use crate::catalog::{Catalog, CtlFeatures, CtlVersion, LmCaps, LmFeatures, PingpongFeatures};

use super::ids;

/// Two peered mixers with DSPPs, one split-capable CTL and one plain CTL, a
/// peered DSC pair and interfaces 1 and 2. CTL v1.
pub fn two_mixer_catalog() -> Catalog {
    Catalog::builder()
        .ctl_version(CtlVersion::V1)
        .lm(LmCaps::new(0, 0).dspp(0).peers(ids(&[1])))
        .lm(LmCaps::new(1, 1).dspp(1).peers(ids(&[0])))
        .pingpong(0, PingpongFeatures::empty())
        .pingpong(1, PingpongFeatures::empty())
        .blocks(BlockKind::Dspp, [0, 1])
        .ctl(0, CtlFeatures::SPLIT_DISPLAY)
        .ctl(1, CtlFeatures::empty())
        .dsc(0, ids(&[1]))
        .dsc(1, ids(&[0]))
        .blocks(BlockKind::Intf, [1, 2])
        .build()
        .expect("two mixer catalog")
}

/// Four mutually peered mixers on shared ROI-MISR/DSC hardware. Only LM0 and
/// LM1 reach a ROI-MISR (and so a DSC), which makes a quad 3D-merge DSC
/// topology fit only as `[LM0, LM2, LM1, LM3]`.
pub fn quad_misr_catalog() -> Catalog {
    let all = [0, 1, 2, 3];
    let peers = |id| ids(&all.into_iter().filter(|&p| p != id).collect::<Vec<_>>());

    Catalog::builder()
        .ctl_version(CtlVersion::V1)
        .roi_misr_dsc_shared(true)
        .lm(LmCaps::new(0, 0).roi_misr(0).peers(peers(0)))
        .lm(LmCaps::new(1, 1).roi_misr(1).peers(peers(1)))
        .lm(LmCaps::new(2, 2).peers(peers(2)))
        .lm(LmCaps::new(3, 3).peers(peers(3)))
        .blocks(BlockKind::Pingpong, all)
        .blocks(BlockKind::RoiMisr, [0, 1])
        .dsc(0, ids(&[1]))
        .dsc(1, ids(&[0]))
        .ctl(0, CtlFeatures::SPLIT_DISPLAY)
        .blocks(BlockKind::Intf, [1, 2])
        .build()
        .expect("quad misr catalog")
}

/// Legacy CTL protocol chip with a mix of features:
///
/// - LM0/LM1: DSPP and DS, peered; LM0 prefers the primary display
/// - LM2/LM3: bare, peered, CWB capable
/// - PP0 can split; PP4 is an unwired split slave
/// - CTL0 split + pingpong split, CTL1 split, CTL2 plain, CTL3 plain and
///   primary preferred
/// - DSC0..3 peered in pairs, CDM0 reaching INTF1 and WB2
pub fn legacy_catalog() -> Catalog {
    Catalog::builder()
        .ctl_version(CtlVersion::Legacy)
        .lm(LmCaps::new(0, 0)
            .dspp(0)
            .ds(0)
            .peers(ids(&[1]))
            .features(LmFeatures::PRIMARY_PREF))
        .lm(LmCaps::new(1, 1).dspp(1).ds(1).peers(ids(&[0])))
        .lm(LmCaps::new(2, 2).peers(ids(&[3])).features(LmFeatures::CWB_PREF))
        .lm(LmCaps::new(3, 3).peers(ids(&[2])).features(LmFeatures::CWB_PREF))
        .pingpong(0, PingpongFeatures::SPLIT)
        .blocks(BlockKind::Pingpong, [1, 2, 3])
        .pingpong(4, PingpongFeatures::SLAVE)
        .blocks(BlockKind::Dspp, [0, 1])
        .blocks(BlockKind::Ds, [0, 1])
        .ctl(0, CtlFeatures::SPLIT_DISPLAY | CtlFeatures::PINGPONG_SPLIT)
        .ctl(1, CtlFeatures::SPLIT_DISPLAY)
        .ctl(2, CtlFeatures::empty())
        .ctl(3, CtlFeatures::PRIMARY_PREF)
        .dsc(0, ids(&[1]))
        .dsc(1, ids(&[0]))
        .dsc(2, ids(&[3]))
        .dsc(3, ids(&[2]))
        .cdm(0, ids(&[1]), ids(&[2]))
        .blocks(BlockKind::Intf, [0, 1, 2])
        .block(BlockKind::Wb, 2)
        .build()
        .expect("legacy catalog")
}

/// Uniform chip: `mixers` bare mixers peered in pairs, the same number of
/// plain CTLs, DSCs peered in pairs and one interface per mixer.
#[derive(Debug, Builder)]
#[builder(pattern = "owned")]
pub struct UniformCatalogSetup {
    #[builder(default = "4")]
    pub mixers: u32,

    #[builder(default = "0")]
    pub split_ctls: u32,

    #[builder(default = "0")]
    pub qdss: u32,

    #[builder(default = "CtlVersion::V1")]
    pub ctl_version: CtlVersion,
}

impl UniformCatalogSetup {
    pub fn catalog(&self) -> Catalog {
        let pair = |id: u32| ids(&[id ^ 1]);
        let mut builder = Catalog::builder().ctl_version(self.ctl_version);

        for id in 0..self.mixers {
            let peers = if id ^ 1 < self.mixers { pair(id) } else { ids(&[]) };
            builder = builder.lm(LmCaps::new(id, id).peers(peers));
        }
        builder = builder.blocks(BlockKind::Pingpong, 0..self.mixers);

        for id in 0..self.mixers {
            let features = if id < self.split_ctls {
                CtlFeatures::SPLIT_DISPLAY
            } else {
                CtlFeatures::empty()
            };
            builder = builder.ctl(id, features);
        }

        for id in 0..self.mixers {
            let peers = if id ^ 1 < self.mixers { pair(id) } else { ids(&[]) };
            builder = builder.dsc(id, peers);
        }

        builder
            .blocks(BlockKind::Intf, 0..self.mixers)
            .blocks(BlockKind::Qdss, 0..self.qdss)
            .build()
            .expect("uniform catalog")
    }
}
