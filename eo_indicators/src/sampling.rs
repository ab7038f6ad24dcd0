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

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize,Serialize};

use eo_common::geo::GeoRect;

pub const DEFAULT_SAMPLING_SEED: u64 = 42;

fn default_seed()->u64 { DEFAULT_SAMPLING_SEED }

/// sparse sampling of large (global) regions: instead of reducing the whole region we reduce
/// `points` square boxes of `size_deg` that are randomly placed inside the region bounds
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct GlobalSampling {
    pub points: usize,
    pub size_deg: f64,
    #[serde(default="default_seed")]
    pub seed: u64,
}

impl GlobalSampling {
    pub fn new (points: usize, size_deg: f64)->Self {
        GlobalSampling { points, size_deg, seed: DEFAULT_SAMPLING_SEED }
    }

    pub fn check (&self, bounds: &GeoRect)->Result<(),String> {
        if self.points == 0 {
            return Err( "sampling needs at least one point".into())
        }
        if !(self.size_deg.is_finite() && self.size_deg > 0.0) {
            return Err( format!("invalid sample size {}", self.size_deg))
        }
        if self.size_deg > bounds.width_deg() || self.size_deg > bounds.height_deg() {
            return Err( format!("sample size {}° exceeds region extent", self.size_deg))
        }
        Ok(())
    }
}

/// the sample boxes for given bounds. Deterministic for a given seed, all boxes are fully inside `bounds`
pub fn sample_boxes (bounds: &GeoRect, sampling: &GlobalSampling)->Vec<GeoRect> {
    let mut rng = StdRng::seed_from_u64( sampling.seed);
    let size = sampling.size_deg;
    let max_west = bounds.east() - size;
    let max_south = bounds.north() - size;

    (0..sampling.points).map( |_| {
        let west = if max_west > bounds.west() { rng.random_range( bounds.west()..max_west) } else { bounds.west() };
        let south = if max_south > bounds.south() { rng.random_range( bounds.south()..max_south) } else { bounds.south() };
        GeoRect::from_wsen_degrees( west, south, west + size, south + size)
    }).collect()
}
