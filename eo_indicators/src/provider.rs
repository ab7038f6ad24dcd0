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

//! the abstraction of the imagery archive we reduce. Providers are responsible for finding
//! imagery and compositing it (temporal mean) onto a regular grid over a region; masking and
//! reduction of the composited cells happens in the [`crate::reducer`]

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize,Serialize};

use eo_common::geo::{meters_per_degree, GeoPoint, GeoRect};
use crate::errors::{op_failed, Result};
use crate::period::TimeWindow;
use crate::region::RegionGeometry;

/// handle for a single archive image
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct Imagery {
    pub id: String,
    pub collection_id: String,
    pub band: String,
    pub date: NaiveDate,
}

#[derive(Debug,Clone,Copy,PartialEq)]
pub enum Cell {
    /// cell center is not inside the region geometry
    Outside,
    /// inside but no image had data for it
    Missing,
    /// raw (unscaled) composite value
    Value(f64),
}

/// composited raster cells over the bounds of a region, row major starting at the north west corner
#[derive(Debug,Clone)]
pub struct RegionSample {
    pub bounds: GeoRect,
    pub width: usize,
    pub height: usize,
    pub resolution: f64,
    pub cells: Vec<Cell>,
}

impl RegionSample {
    /// build a grid of `resolution` m/px over the bounds of `region`, evaluating `f` for each cell center inside the region.
    /// Longitudinal cell size is taken at the latitude of the bounds center. Only cells inside the region count
    /// against the pixel budget, with some slack for cells along the boundary
    pub fn grid<F> (region: &RegionGeometry, resolution: f64, max_pixels: u64, mut f: F)->Result<Self>
        where F: FnMut(&GeoPoint)->Option<f64>
    {
        let bounds = region.bounds();
        let mpd = meters_per_degree();
        let cos_lat = bounds.center().lat().to_radians().cos().max(0.01);
        let dlat = resolution / mpd;
        let dlon = resolution / (mpd * cos_lat);

        let width = ((bounds.width_deg() / dlon) - 1e-9).ceil().max(1.0) as usize;
        let height = ((bounds.height_deg() / dlat) - 1e-9).ceil().max(1.0) as usize;
        let max_inside = max_pixels.saturating_mul(4).max(1024);

        let mut cells = Vec::with_capacity( width * height);
        let mut inside: u64 = 0;
        for j in 0..height {
            let lat = bounds.north() - (j as f64 + 0.5) * dlat;
            for i in 0..width {
                let lon = bounds.west() + (i as f64 + 0.5) * dlon;
                let p = GeoPoint::from_lon_lat_degrees( lon, lat);
                let cell = if region.contains( &p) {
                    inside += 1;
                    if inside > max_inside {
                        return Err( op_failed( format!("more than {max_inside} cells inside region at {resolution} m/px (pixel budget {max_pixels})")))
                    }
                    match f(&p) {
                        Some(v) if v.is_finite() => Cell::Value(v),
                        _ => Cell::Missing
                    }
                } else {
                    Cell::Outside
                };
                cells.push( cell);
            }
        }

        Ok( RegionSample { bounds, width, height, resolution, cells })
    }

    /// number of cells inside the region
    pub fn footprint (&self)->usize {
        self.cells.iter().filter( |c| !matches!( c, Cell::Outside)).count()
    }
}

#[async_trait]
pub trait ImageryProvider: Send + Sync {
    fn name (&self)->&str;

    /// all images of a collection band that intersect the region within the given window
    async fn query_collection (&self, collection_id: &str, band: &str, region: &RegionGeometry, window: &TimeWindow)->Result<Vec<Imagery>>;

    /// temporal mean composite of `imagery`, resampled to `resolution` m/px and clipped to the region.
    /// An empty `imagery` slice yields [`Cell::Missing`] for all cells inside the region
    async fn composite_region (&self, imagery: &[Imagery], region: &RegionGeometry, resolution: f64, max_pixels: u64)->Result<RegionSample>;
}
