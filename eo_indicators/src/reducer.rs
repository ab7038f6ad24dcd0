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

//! reduction of a (dataset, region, time window) triple to a single value, including the
//! pixel budget driven resolution planning and the retry/timeout policy for provider calls

use std::{fmt, future::Future, sync::Arc, time::Duration};
use serde::{Deserialize,Serialize};
use strum::{Display,EnumString};
use tokio_util::sync::CancellationToken;
use tracing::{debug,info,warn};

use eo_common::{
    MinMaxAvg,
    datetime::{deserialize_duration, serialize_duration, millis, minutes, secs},
    geo::{GeoPoint, GeoRect}
};
use crate::dataset::{DatasetDescriptor, DatasetKey};
use crate::errors::{configuration_error, provider_unavailable, EoIndicatorsError, Result};
use crate::period::TimeWindow;
use crate::provider::{Cell, ImageryProvider, RegionSample};
use crate::region::{Region, RegionGeometry};

/* #region resolution planning ************************************************************************************/

/// why a dataset could not be reduced within the pixel budget
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct BudgetShortfall {
    pub dataset: DatasetKey,
    pub area_m2: f64,
    pub max_resolution: f64,
    pub pixels_at_max_resolution: u64,
    pub max_pixels: u64,
}

impl fmt::Display for BudgetShortfall {
    fn fmt (&self, f: &mut fmt::Formatter<'_>)->fmt::Result {
        write!( f, "{}: {:.0} m² needs {} pixels at coarsest resolution {} m/px (budget {})",
            self.dataset, self.area_m2, self.pixels_at_max_resolution, self.max_resolution, self.max_pixels)
    }
}

/// the resolution we actually reduce at. Coarsening doubles the base resolution until the
/// estimated pixel count ceil(area/res²) fits into the budget. If the next doubling would be coarser
/// than the dataset's max resolution we make a last step to exactly that resolution (`capped`)
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct ResolutionPlan {
    pub requested: f64,
    pub native: f64,
    /// max(requested, native)
    pub base: f64,
    pub max_resolution: f64,
    pub coarsening_steps: u32,
    #[serde(default)]
    pub capped: bool,
    pub effective: f64,
    pub estimated_pixels: u64,
    pub max_pixels: u64,
}

impl ResolutionPlan {
    pub fn estimate_pixels (area_m2: f64, resolution: f64)->u64 {
        (area_m2 / (resolution * resolution)).ceil() as u64
    }

    pub fn effective_for (base: f64, coarsening_steps: u32)->f64 {
        base * 2f64.powi( coarsening_steps as i32)
    }

    pub fn compute (dataset: DatasetKey, area_m2: f64, requested: f64, native: f64, max_resolution: f64, max_pixels: u64)->std::result::Result<Self,BudgetShortfall> {
        let base = requested.max( native);
        let mut effective = base;
        let mut coarsening_steps = 0;
        let mut capped = false;
        let mut estimated_pixels = Self::estimate_pixels( area_m2, effective);

        while estimated_pixels > max_pixels {
            let pixels_at_max_resolution = Self::estimate_pixels( area_m2, max_resolution);
            let coarser = effective * 2.0;

            if coarser > max_resolution {
                if max_resolution > effective && pixels_at_max_resolution <= max_pixels {
                    effective = max_resolution;
                    coarsening_steps += 1;
                    capped = true;
                    estimated_pixels = pixels_at_max_resolution;
                    break
                }
                return Err( BudgetShortfall { dataset, area_m2, max_resolution, pixels_at_max_resolution, max_pixels })
            }
            effective = coarser;
            coarsening_steps += 1;
            estimated_pixels = Self::estimate_pixels( area_m2, effective);
        }

        Ok( ResolutionPlan { requested, native, base, max_resolution, coarsening_steps, capped, effective, estimated_pixels, max_pixels })
    }

    pub fn is_coarsened (&self)->bool { self.coarsening_steps > 0 }

    /// re-derive the effective resolution from the recorded base, steps and cap
    pub fn rederive_effective (&self)->f64 {
        if self.capped { self.max_resolution } else { Self::effective_for( self.base, self.coarsening_steps) }
    }
}

/* #endregion resolution planning */

/* #region request and result types *******************************************************************************/

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Serialize,Deserialize,Display,EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ReducerKind {
    Mean,
    Max,
    Min,
    CountAboveThreshold,
    FractionAboveThreshold,
}

impl ReducerKind {
    pub fn needs_threshold (&self)->bool {
        matches!( self, ReducerKind::CountAboveThreshold | ReducerKind::FractionAboveThreshold)
    }
}

#[derive(Debug,Clone)]
pub struct ReductionRequest {
    pub dataset: Arc<DatasetDescriptor>,
    pub region: Arc<Region>,
    pub window: TimeWindow,
    /// requested resolution in m/px
    pub resolution: f64,
    pub max_pixels: u64,
    pub reducer: ReducerKind,
    pub threshold: Option<f64>,
    /// keep the masked raster of the (single) footprint in the result
    pub keep_raster: bool,
}

impl ReductionRequest {
    pub fn check (&self)->Result<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err( configuration_error( format!("invalid resolution {}", self.resolution)))
        }
        if self.max_pixels == 0 {
            return Err( configuration_error( "zero pixel budget"))
        }
        if self.reducer.needs_threshold() && self.threshold.is_none() {
            return Err( configuration_error( format!("reducer {} for dataset {} requires a threshold", self.reducer, self.dataset.key)))
        }
        Ok(())
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum Coverage {
    /// all pixels inside the region were valid
    Full,
    /// some pixels were masked or missing, the value is computed from the remaining ones
    Partial,
    /// no valid pixel at all. This is not the same as a zero value
    NoData,
}

/// masked physical values of a composite, row major from the north west corner
#[derive(Debug,Clone,PartialEq,Serialize)]
pub struct Raster {
    pub bounds: GeoRect,
    pub width: usize,
    pub height: usize,
    pub resolution: f64,
    pub values: Vec<Option<f64>>,
}

/// reduced value of a single sample box of a sampled region
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct SampleValue {
    pub center: GeoPoint,
    pub value: Option<f64>,
    pub valid_pixels: u64,
}

#[derive(Debug,Clone,Serialize)]
pub struct ReductionResult {
    pub value: Option<f64>,
    pub reducer: ReducerKind,
    pub valid_pixels: u64,
    pub footprint_pixels: u64,
    #[serde(skip_serializing_if="eo_common::is_none")]
    pub above_threshold: Option<u64>,
    pub coverage: Coverage,
    pub effective_resolution: f64,
    pub images: usize,
    #[serde(skip)]
    pub raster: Option<Raster>,
    #[serde(skip_serializing_if="Vec::is_empty")]
    pub samples: Vec<SampleValue>,
}

impl ReductionResult {
    pub fn no_data (reducer: ReducerKind, plan: &ResolutionPlan)->Self {
        ReductionResult {
            value: None, reducer, valid_pixels: 0, footprint_pixels: 0, above_threshold: None,
            coverage: Coverage::NoData, effective_resolution: plan.effective, images: 0, raster: None, samples: Vec::new()
        }
    }

    pub fn is_no_data (&self)->bool { self.coverage == Coverage::NoData }

    pub fn coverage_fraction (&self)->f64 {
        if self.footprint_pixels > 0 { self.valid_pixels as f64 / self.footprint_pixels as f64 } else { 0.0 }
    }
}

/* #endregion request and result types */

/* #region pixel statistics ***************************************************************************************/

#[derive(Debug,Clone,Default)]
struct PixelStats {
    footprint: u64,
    valid: u64,
    above: u64,
    mma: MinMaxAvg,
}

impl PixelStats {
    fn add (&mut self, v: Option<f64>, threshold: Option<f64>) {
        self.footprint += 1;
        if let Some(v) = v {
            self.valid += 1;
            self.mma.add(v);
            if let Some(t) = threshold {
                if v > t { self.above += 1 }
            }
        }
    }

    fn value (&self, kind: ReducerKind)->Option<f64> {
        if self.valid == 0 { return None }
        match kind {
            ReducerKind::Mean => Some( self.mma.avg),
            ReducerKind::Max => Some( self.mma.max),
            ReducerKind::Min => Some( self.mma.min),
            ReducerKind::CountAboveThreshold => Some( self.above as f64),
            ReducerKind::FractionAboveThreshold => Some( self.above as f64 / self.valid as f64),
        }
    }

    fn coverage (&self)->Coverage {
        if self.valid == 0 { Coverage::NoData }
        else if self.valid < self.footprint { Coverage::Partial }
        else { Coverage::Full }
    }
}

/* #endregion pixel statistics */

/* #region reducer ************************************************************************************************/

fn default_max_attempts()->u32 { 4 }
fn default_call_timeout()->Duration { minutes(2) }
fn default_retry_delay()->Duration { secs(2) }

/// how provider calls are retried. Only transient failures (outages, timeouts) are retried, with
/// exponentially increasing delay
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct RetryPolicy {
    #[serde(default="default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default="default_call_timeout", deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub call_timeout: Duration,

    #[serde(default="default_retry_delay", deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// single attempt, mostly for tests
    pub fn no_retry (call_timeout: Duration)->Self {
        RetryPolicy { max_attempts: 1, call_timeout, retry_delay: millis(0) }
    }

    /// delay after a failed `attempt` (starting at 1), doubling with each attempt
    pub fn backoff (&self, attempt: u32)->Duration {
        self.retry_delay.saturating_mul( 2u32.saturating_pow( attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default()->Self {
        RetryPolicy { max_attempts: default_max_attempts(), call_timeout: default_call_timeout(), retry_delay: default_retry_delay() }
    }
}

pub struct Reducer {
    provider: Arc<dyn ImageryProvider>,
    retry: RetryPolicy,
}

impl Reducer {
    pub fn new (provider: Arc<dyn ImageryProvider>, retry: RetryPolicy)->Self {
        Reducer { provider, retry }
    }

    pub fn provider_name (&self)->&str { self.provider.name() }

    /// resolution plan for a request. This does not involve the provider, it only depends on the
    /// footprint area and the dataset resolution limits
    pub fn plan (&self, request: &ReductionRequest)->Result<ResolutionPlan> {
        request.check()?;
        let ds = &request.dataset;
        ResolutionPlan::compute( ds.key, request.region.max_footprint_area_m2(), request.resolution, ds.native_resolution, ds.max_resolution, request.max_pixels)
            .map_err( EoIndicatorsError::BudgetExceeded)
    }

    pub async fn reduce (&self, request: &ReductionRequest)->Result<ReductionResult> {
        let plan = self.plan( request)?;
        self.reduce_with_plan( request, &plan, &CancellationToken::new()).await
    }

    /// reduce with a pre-computed plan (which is shared between all periods of a time series)
    pub async fn reduce_with_plan (&self, request: &ReductionRequest, plan: &ResolutionPlan, cancel: &CancellationToken)->Result<ReductionResult> {
        request.check()?;
        let ds = request.dataset.as_ref();
        let window = &request.window;

        if !ds.covers( window) {
            debug!("{} has no coverage for {window}", ds.key);
            return Ok( ReductionResult::no_data( request.reducer, plan))
        }

        let mut total = PixelStats::default();
        let mut samples = Vec::new();
        let mut raster = None;
        let mut images = 0;

        for footprint in request.region.footprints() {
            let (sample, n_images) = self.composite( ds, footprint, window, plan, cancel).await?;
            images += n_images;

            let mut stats = PixelStats::default();
            let mut values = Vec::with_capacity( sample.cells.len());
            for cell in &sample.cells {
                let v = match cell {
                    Cell::Outside => { values.push(None); continue }
                    Cell::Missing => None,
                    Cell::Value(raw) => ds.physical_value( *raw)
                };
                stats.add( v, request.threshold);
                total.add( v, request.threshold);
                values.push( v);
            }

            if request.region.is_sampled() {
                samples.push( SampleValue {
                    center: sample.bounds.center(),
                    value: stats.value( request.reducer),
                    valid_pixels: stats.valid
                });
            } else if request.keep_raster {
                raster = Some( Raster { bounds: sample.bounds, width: sample.width, height: sample.height, resolution: sample.resolution, values });
            }
        }

        let result = ReductionResult {
            value: total.value( request.reducer),
            reducer: request.reducer,
            valid_pixels: total.valid,
            footprint_pixels: total.footprint,
            above_threshold: request.threshold.map( |_| total.above),
            coverage: total.coverage(),
            effective_resolution: plan.effective,
            images,
            raster,
            samples
        };

        info!("reduced {} over {} for {window}: {:?} ({:?}, {}/{} valid px at {} m/px)",
            ds.key, request.region.name, result.value, result.coverage, result.valid_pixels, result.footprint_pixels, plan.effective);
        Ok(result)
    }

    async fn composite (&self, ds: &DatasetDescriptor, footprint: &RegionGeometry, window: &TimeWindow, plan: &ResolutionPlan, cancel: &CancellationToken)->Result<(RegionSample,usize)> {
        let provider = self.provider.as_ref();
        let collection = ds.collection_id.as_str();
        let band = ds.band.as_str();

        let imagery = self.call_with_retry( "query_collection", cancel,
            move || provider.query_collection( collection, band, footprint, window)).await?;

        if imagery.is_empty() {
            // nothing to composite, all cells inside are missing
            let sample = RegionSample::grid( footprint, plan.effective, plan.max_pixels, |_| None)?;
            return Ok( (sample, 0))
        }

        let imgs = imagery.as_slice();
        let sample = self.call_with_retry( "composite_region", cancel,
            move || provider.composite_region( imgs, footprint, plan.effective, plan.max_pixels)).await?;
        Ok( (sample, imagery.len()))
    }

    async fn call_with_retry<T,F,Fut> (&self, what: &str, cancel: &CancellationToken, f: F)->Result<T>
        where F: Fn()->Fut, Fut: Future<Output=Result<T>>
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let res = tokio::select! {
                _ = cancel.cancelled() => return Err( EoIndicatorsError::Cancelled),
                r = tokio::time::timeout( self.retry.call_timeout, f()) => match r {
                    Ok(r) => r,
                    Err(_) => Err( EoIndicatorsError::Timeout( self.retry.call_timeout))
                }
            };

            match res {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff( attempt);
                    warn!("{what} attempt {attempt} failed: {e}, retrying in {delay:?}");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err( EoIndicatorsError::Cancelled),
                        _ = tokio::time::sleep( delay) => {}
                    }
                }
                Err(e) if e.is_transient() => {
                    return Err( provider_unavailable( format!("{what} failed after {attempt} attempts: {e}")))
                }
                Err(e) => return Err(e)
            }
        }
    }
}

/* #endregion reducer */
