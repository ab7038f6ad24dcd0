/*
 * Copyright © 2024, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::{path::PathBuf, str::FromStr};
use anyhow::{anyhow, Result};

use eo_common::define_cli;
use eo_indicators::region::{RegionCatalog, RegionKind};

define_cli! { ARGS [about="show_regions - list the regions of a region table with their validity, area and centroid"] =
    kind: Option<String> [help="only show regions of this kind (global|local)", long, short],
    regions: PathBuf [help="pathname of region table (RON)"]
}

fn main ()->Result<()> {
    let kind_filter = match &ARGS.kind {
        Some(s) => Some( RegionKind::from_str(s).map_err( |_| anyhow!("unknown region kind '{s}'"))?),
        None => None
    };

    let catalog = RegionCatalog::load( &ARGS.regions)?;
    println!("{} regions in {:?}", catalog.len(), ARGS.regions);

    for (kind, name, entry) in catalog.entries() {
        if kind_filter.map( |k| k != kind).unwrap_or(false) { continue }

        match entry {
            Ok(region) => {
                let c = region.geometry.centroid();
                let samples = region.sampling.as_ref().map( |s| format!(", {} samples of {}°", s.points, s.size_deg)).unwrap_or_default();
                println!("  {kind:6} {name:24} {:>14.1} km²  centroid {c}{samples}  \"{}\"", region.geometry.area_m2() / 1.0e6, region.label);
            }
            Err(reason) => {
                println!("  {kind:6} {name:24} INVALID: {reason}");
            }
        }
    }
    Ok(())
}
