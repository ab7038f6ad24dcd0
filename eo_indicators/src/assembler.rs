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

//! time series of reductions over a partitioned date range

use std::sync::Arc;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize,Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug,info,warn};

use crate::dataset::{DatasetDescriptor, DatasetKey, DatasetRegistry, ThresholdPolicy};
use crate::errors::{configuration_error, EoIndicatorsError, Result};
use crate::period::{partition, Period, PeriodGranularity, Season};
use crate::reducer::{Coverage, Reducer, ReducerKind, ReductionRequest, ReductionResult, ResolutionPlan};
use crate::region::Region;

/// why a period has no result
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub enum GapReason {
    ProviderUnavailable(String),
    Cancelled,
    Failed(String),
}

impl From<&EoIndicatorsError> for GapReason {
    fn from (e: &EoIndicatorsError)->Self {
        match e {
            EoIndicatorsError::Cancelled => GapReason::Cancelled,
            EoIndicatorsError::ProviderUnavailable(_) | EoIndicatorsError::Timeout(_) => GapReason::ProviderUnavailable( e.to_string()),
            _ => GapReason::Failed( e.to_string())
        }
    }
}

impl std::fmt::Display for GapReason {
    fn fmt (&self, f: &mut std::fmt::Formatter<'_>)->std::fmt::Result {
        match self {
            GapReason::ProviderUnavailable(msg) => write!( f, "{msg}"),
            GapReason::Cancelled => write!( f, "cancelled"),
            GapReason::Failed(msg) => write!( f, "{msg}"),
        }
    }
}

#[derive(Debug,Clone,Serialize)]
pub enum PeriodOutcome {
    Value(ReductionResult),
    Gap(GapReason),
}

#[derive(Debug,Clone,Serialize)]
pub struct SeriesEntry {
    pub period: Period,
    pub outcome: PeriodOutcome,
}

impl SeriesEntry {
    pub fn result (&self)->Option<&ReductionResult> {
        if let PeriodOutcome::Value(r) = &self.outcome { Some(r) } else { None }
    }

    pub fn gap (&self)->Option<&GapReason> {
        if let PeriodOutcome::Gap(reason) = &self.outcome { Some(reason) } else { None }
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum SeriesStatus {
    Complete,
    Cancelled,
}

/// one entry per period, in chronological order. Failed periods are kept as gaps
#[derive(Debug,Clone,Serialize)]
pub struct TimeSeries {
    pub dataset: DatasetKey,
    pub unit: String,
    pub region: String,
    pub reducer: ReducerKind,
    pub plan: ResolutionPlan,
    pub status: SeriesStatus,
    pub entries: Vec<SeriesEntry>,
}

impl TimeSeries {
    pub fn gaps (&self)->Vec<(&Period,&GapReason)> {
        self.entries.iter().filter_map( |e| e.gap().map( |g| (&e.period, g))).collect()
    }

    pub fn results (&self)->impl Iterator<Item=(&Period,&ReductionResult)> {
        self.entries.iter().filter_map( |e| e.result().map( |r| (&e.period, r)))
    }

    /// the most recent period that was fully covered
    pub fn latest_full (&self)->Option<(&Period,&ReductionResult)> {
        self.entries.iter().rev()
            .filter_map( |e| e.result().map( |r| (&e.period, r)))
            .find( |(_,r)| r.coverage == Coverage::Full)
    }

    pub fn is_cancelled (&self)->bool { self.status == SeriesStatus::Cancelled }
}

/// parameters of a series that do not depend on dataset or region
#[derive(Debug,Clone)]
pub struct AssemblyOptions {
    pub reducer: ReducerKind,
    pub resolution: f64,
    pub max_pixels: u64,
    pub season: Option<Season>,
    pub keep_rasters: bool,
}

/// a fully validated series request. Preparation does not involve the provider
#[derive(Debug,Clone)]
pub struct PreparedSeries {
    pub descriptor: Arc<DatasetDescriptor>,
    pub periods: Vec<Period>,
    pub plan: ResolutionPlan,
    request: ReductionRequest,
}

pub struct TimeSeriesAssembler {
    reducer: Arc<Reducer>,
    registry: Arc<DatasetRegistry>,
    thresholds: Arc<ThresholdPolicy>,
    parallelism: usize,
}

impl TimeSeriesAssembler {
    pub fn new (reducer: Arc<Reducer>, registry: Arc<DatasetRegistry>, thresholds: Arc<ThresholdPolicy>, parallelism: usize)->Self {
        TimeSeriesAssembler { reducer, registry, thresholds, parallelism: parallelism.max(1) }
    }

    pub fn registry (&self)->&DatasetRegistry { &self.registry }

    /// validate everything we need to assemble the series. Unknown datasets, missing thresholds and
    /// invalid period ranges are configuration errors, a plan that does not fit the pixel budget is BudgetExceeded
    pub fn prepare (&self, dataset_key: &str, region: &Arc<Region>, start: NaiveDate, end: NaiveDate,
                    granularity: PeriodGranularity, opts: &AssemblyOptions)->Result<PreparedSeries>
    {
        let descriptor = self.registry.describe( dataset_key)?;
        let periods = partition( start, end, granularity, opts.season.as_ref())?;
        let first = periods.first().ok_or_else( || configuration_error( "no periods"))?;

        let threshold = self.thresholds.threshold_for( &descriptor);
        if opts.reducer.needs_threshold() && threshold.is_none() {
            return Err( configuration_error( format!("no threshold '{}' for dataset {}",
                descriptor.threshold_key.as_deref().unwrap_or("?"), descriptor.key)))
        }

        let request = ReductionRequest {
            dataset: descriptor.clone(),
            region: region.clone(),
            window: first.window.unwrap_or( first.bounds),
            resolution: opts.resolution,
            max_pixels: opts.max_pixels,
            reducer: opts.reducer,
            threshold,
            keep_raster: opts.keep_rasters && !region.is_sampled(),
        };
        let plan = self.reducer.plan( &request)?;
        if plan.is_coarsened() {
            info!("{} over {} coarsened from {} to {} m/px ({} steps)", descriptor.key, region.name, plan.base, plan.effective, plan.coarsening_steps);
        }

        Ok( PreparedSeries { descriptor, periods, plan, request })
    }

    /// reduce all periods of a prepared series with bounded concurrency. Per-period failures become gaps
    pub async fn run (&self, prepared: &PreparedSeries, cancel: &CancellationToken)->TimeSeries {
        let ds = &prepared.descriptor;
        let region = &prepared.request.region;
        info!("assembling {} periods of {} over {} ({} concurrent)", prepared.periods.len(), ds.key, region.name, self.parallelism);

        let mut outcomes: Vec<(usize,PeriodOutcome)> = stream::iter( prepared.periods.iter().enumerate())
            .map( |(idx, period)| {
                let mut request = prepared.request.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (idx, PeriodOutcome::Gap( GapReason::Cancelled))
                    }
                    let Some(window) = period.window else {
                        debug!("season of {} does not fall into the requested range", period.label);
                        return (idx, PeriodOutcome::Value( ReductionResult::no_data( request.reducer, &prepared.plan)))
                    };
                    request.window = window;
                    match self.reducer.reduce_with_plan( &request, &prepared.plan, cancel).await {
                        Ok(result) => (idx, PeriodOutcome::Value(result)),
                        Err(e) => {
                            warn!("no {} value for period {}: {e}", request.dataset.key, period.label);
                            (idx, PeriodOutcome::Gap( GapReason::from(&e)))
                        }
                    }
                }
            })
            .buffer_unordered( self.parallelism)
            .collect().await;

        // completion order is arbitrary
        outcomes.sort_by_key( |(idx,_)| *idx);

        let entries: Vec<SeriesEntry> = outcomes.into_iter()
            .map( |(idx,outcome)| SeriesEntry { period: prepared.periods[idx].clone(), outcome })
            .collect();

        let cancelled = cancel.is_cancelled() || entries.iter().any( |e| e.gap() == Some(&GapReason::Cancelled));
        let status = if cancelled { SeriesStatus::Cancelled } else { SeriesStatus::Complete };

        let ts = TimeSeries {
            dataset: ds.key,
            unit: ds.unit.clone(),
            region: region.name.clone(),
            reducer: prepared.request.reducer,
            plan: prepared.plan.clone(),
            status,
            entries
        };
        info!("{} series over {} done: {} periods, {} gaps, {:?}", ts.dataset, ts.region, ts.entries.len(), ts.gaps().len(), ts.status);
        ts
    }

    pub async fn assemble (&self, dataset_key: &str, region: &Arc<Region>, start: NaiveDate, end: NaiveDate,
                           granularity: PeriodGranularity, opts: &AssemblyOptions, cancel: &CancellationToken)->Result<TimeSeries>
    {
        let prepared = self.prepare( dataset_key, region, start, end, granularity, opts)?;
        Ok( self.run( &prepared, cancel).await)
    }
}
