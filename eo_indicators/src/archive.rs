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

//! provider for a local directory of pre-exported grids, laid out as
//! `<root>/<collection>/<band>/<YYYY-MM-DD>.json` (collection ids use '_' instead of '/')

use std::path::{Path,PathBuf};
use async_trait::async_trait;
use serde::{Deserialize,Serialize};
use tracing::{debug,warn};

use eo_common::{
    datetime::parse_naive_date,
    fs::{filestem, matching_files_in_dir, path_safe_name},
    geo::{GeoPoint, GeoRect}
};
use crate::errors::{configuration_error, Result};
use crate::period::TimeWindow;
use crate::provider::{ImageryProvider, Imagery, RegionSample};
use crate::region::RegionGeometry;

/// a single exported image. Values are raw (unscaled), row major from the north west corner
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct ArchiveGrid {
    pub bounds: GeoRect,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub nodata: Option<f64>,
    pub values: Vec<f64>,
}

impl ArchiveGrid {
    pub fn value_at (&self, p: &GeoPoint)->Option<f64> {
        if !self.bounds.contains(p) || self.width == 0 || self.height == 0 {
            return None
        }
        let col = (((p.lon() - self.bounds.west()) / self.bounds.width_deg()) * self.width as f64).floor() as usize;
        let row = (((self.bounds.north() - p.lat()) / self.bounds.height_deg()) * self.height as f64).floor() as usize;
        let idx = row.min( self.height-1) * self.width + col.min( self.width-1);

        let v = *self.values.get(idx)?;
        if !v.is_finite() || self.nodata.map( |nd| nd == v).unwrap_or(false) { None } else { Some(v) }
    }
}

pub struct LocalArchiveProvider {
    root: PathBuf
}

impl LocalArchiveProvider {
    pub fn new (root: impl AsRef<Path>)->Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err( configuration_error( format!("imagery archive {:?} is not a directory", root)))
        }
        Ok( LocalArchiveProvider { root })
    }

    pub fn band_dir (&self, collection_id: &str, band: &str)->PathBuf {
        self.root.join( path_safe_name( collection_id)).join( path_safe_name( band))
    }

    async fn load_grid (&self, img: &Imagery)->Result<ArchiveGrid> {
        let path = self.band_dir( &img.collection_id, &img.band).join( format!("{}.json", img.date));
        let bytes = tokio::fs::read( &path).await?;
        Ok( serde_json::from_slice( &bytes)?)
    }
}

#[async_trait]
impl ImageryProvider for LocalArchiveProvider {
    fn name (&self)->&str { "local-archive" }

    async fn query_collection (&self, collection_id: &str, band: &str, _region: &RegionGeometry, window: &TimeWindow)->Result<Vec<Imagery>> {
        let dir = self.band_dir( collection_id, band);
        let files = matching_files_in_dir( &dir, |fname| fname.ends_with(".json"))?;

        let imagery: Vec<Imagery> = files.iter()
            .filter_map( |path| filestem(path).and_then( parse_naive_date))
            .filter( |date| window.contains(date))
            .map( |date| Imagery {
                id: format!("{collection_id}/{band}/{date}"),
                collection_id: collection_id.to_string(),
                band: band.to_string(),
                date
            })
            .collect();

        debug!("{} images in {:?} for {window}", imagery.len(), dir);
        Ok(imagery)
    }

    async fn composite_region (&self, imagery: &[Imagery], region: &RegionGeometry, resolution: f64, max_pixels: u64)->Result<RegionSample> {
        let bounds = region.bounds();
        let mut grids = Vec::with_capacity( imagery.len());

        for img in imagery {
            let grid = self.load_grid( img).await?;
            if grid.values.len() != grid.width * grid.height {
                warn!("ignoring malformed grid {} ({}x{} with {} values)", img.id, grid.width, grid.height, grid.values.len());
            } else if grid.bounds.intersects( &bounds) {
                grids.push( grid);
            }
        }

        RegionSample::grid( region, resolution, max_pixels, |p| {
            let mut sum = 0.0;
            let mut n = 0;
            for grid in &grids {
                if let Some(v) = grid.value_at(p) {
                    sum += v;
                    n += 1;
                }
            }
            if n > 0 { Some(sum / n as f64) } else { None }
        })
    }
}
