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

//! a provider that computes imagery from a field function. Used for tests and dry runs, it can
//! simulate outages, flaky windows and latency

use std::{
    collections::{HashMap,HashSet},
    sync::{Arc, Mutex, atomic::{AtomicUsize, Ordering}},
    time::Duration
};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use eo_common::{datetime::add_days, geo::GeoPoint};
use crate::errors::{provider_unavailable, Result};
use crate::period::TimeWindow;
use crate::provider::{ImageryProvider, Imagery, RegionSample};
use crate::region::RegionGeometry;

/// raw value at a given position and image date, None if there is no data
pub type SyntheticField = dyn Fn(&GeoPoint, NaiveDate)->Option<f64> + Send + Sync;

pub type LatencyFn = dyn Fn(&TimeWindow)->Duration + Send + Sync;

pub struct SyntheticProvider {
    field: Arc<SyntheticField>,
    images_per_window: usize,
    failing: HashSet<NaiveDate>,
    flaky: Mutex<HashMap<NaiveDate,u32>>,
    latency: Option<Arc<LatencyFn>>,

    query_count: AtomicUsize,
    composite_count: AtomicUsize,
}

impl SyntheticProvider {
    pub fn new<F> (field: F)->Self where F: Fn(&GeoPoint, NaiveDate)->Option<f64> + Send + Sync + 'static {
        SyntheticProvider {
            field: Arc::new(field),
            images_per_window: 1,
            failing: HashSet::new(),
            flaky: Mutex::new( HashMap::new()),
            latency: None,
            query_count: AtomicUsize::new(0),
            composite_count: AtomicUsize::new(0),
        }
    }

    pub fn constant (value: f64)->Self {
        Self::new( move |_,_| Some(value))
    }

    pub fn with_images_per_window (mut self, n: usize)->Self {
        self.images_per_window = n;
        self
    }

    /// every query for a window starting at `start` fails with a provider outage
    pub fn with_failing_window (mut self, start: NaiveDate)->Self {
        self.failing.insert( start);
        self
    }

    /// the first `n` queries for a window starting at `start` fail
    pub fn with_flaky_window (self, start: NaiveDate, n: u32)->Self {
        if let Ok(mut flaky) = self.flaky.lock() {
            flaky.insert( start, n);
        }
        self
    }

    pub fn with_latency<F> (mut self, f: F)->Self where F: Fn(&TimeWindow)->Duration + Send + Sync + 'static {
        self.latency = Some( Arc::new(f));
        self
    }

    pub fn query_count (&self)->usize { self.query_count.load( Ordering::Relaxed) }

    pub fn composite_count (&self)->usize { self.composite_count.load( Ordering::Relaxed) }

    fn take_flaky_failure (&self, start: &NaiveDate)->bool {
        match self.flaky.lock() {
            Ok(mut flaky) => match flaky.get_mut( start) {
                Some(n) if *n > 0 => { *n -= 1; true }
                _ => false
            }
            Err(_) => false
        }
    }
}

#[async_trait]
impl ImageryProvider for SyntheticProvider {
    fn name (&self)->&str { "synthetic" }

    async fn query_collection (&self, collection_id: &str, band: &str, _region: &RegionGeometry, window: &TimeWindow)->Result<Vec<Imagery>> {
        self.query_count.fetch_add( 1, Ordering::Relaxed);

        if let Some(latency) = &self.latency {
            tokio::time::sleep( latency(window)).await;
        }

        if self.failing.contains( &window.start) {
            return Err( provider_unavailable( format!("simulated outage for {window}")))
        }
        if self.take_flaky_failure( &window.start) {
            return Err( provider_unavailable( format!("simulated transient failure for {window}")))
        }

        let step = (window.num_days() as usize / self.images_per_window.max(1)).max(1) as u32;
        let imagery: Vec<Imagery> = (0..self.images_per_window)
            .filter_map( |i| add_days( window.start, i as u32 * step))
            .filter( |d| window.contains(d))
            .map( |date| Imagery {
                id: format!("synthetic/{collection_id}/{band}/{date}"),
                collection_id: collection_id.to_string(),
                band: band.to_string(),
                date
            })
            .collect();

        debug!("synthetic query for {window} -> {} images", imagery.len());
        Ok(imagery)
    }

    async fn composite_region (&self, imagery: &[Imagery], region: &RegionGeometry, resolution: f64, max_pixels: u64)->Result<RegionSample> {
        self.composite_count.fetch_add( 1, Ordering::Relaxed);

        let field = self.field.clone();
        RegionSample::grid( region, resolution, max_pixels, |p| {
            let mut sum = 0.0;
            let mut n = 0;
            for img in imagery {
                if let Some(v) = field( p, img.date) {
                    sum += v;
                    n += 1;
                }
            }
            if n > 0 { Some(sum / n as f64) } else { None }
        })
    }
}
