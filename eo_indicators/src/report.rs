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

//! orchestration of a complete report: series per dataset, map layers and the manifest

use std::sync::Arc;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize,Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info,warn};

use eo_common::datetime::utc_now;
use crate::assembler::{AssemblyOptions, GapReason, PreparedSeries, TimeSeries, TimeSeriesAssembler};
use crate::config::{DatasetSelection, ReportConfig};
use crate::dataset::DatasetKey;
use crate::errors::{EoIndicatorsError, Result};
use crate::map::{Basemap, ColorRamp, LayerStyle, MapComposer, MapLayer, MapLayerSpec};
use crate::period::{PeriodGranularity, Season};
use crate::reducer::{BudgetShortfall, Coverage, ResolutionPlan};
use crate::region::{Region, RegionCatalog, RegionKind};

pub const RASTER_OPACITY: f64 = 0.7;

/// what to build. Usually derived from a [`ReportConfig`]
#[derive(Debug,Clone)]
pub struct ReportRequest {
    pub experiment_id: String,
    pub region_kind: RegionKind,
    pub region_name: String,
    pub datasets: Vec<DatasetSelection>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: PeriodGranularity,
    pub season: Option<Season>,
    pub resolution: f64,
    pub max_pixels: u64,
    pub basemap: Basemap,
    pub include_maps: bool,
}

impl From<&ReportConfig> for ReportRequest {
    fn from (config: &ReportConfig)->Self {
        ReportRequest {
            experiment_id: config.experiment_id.clone(),
            region_kind: config.region_mode,
            region_name: config.region_name.clone(),
            datasets: config.datasets.clone(),
            start: config.start,
            end: config.end,
            granularity: config.granularity,
            season: config.season.clone(),
            resolution: config.resolution,
            max_pixels: config.max_pixels,
            basemap: config.basemap,
            include_maps: config.include_maps,
        }
    }
}

/* #region manifest ***********************************************************************************************/

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum RunStatus {
    Complete,
    Cancelled,
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct CoarseningRecord {
    pub dataset: DatasetKey,
    pub plan: ResolutionPlan,
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct GapRecord {
    pub dataset: DatasetKey,
    pub period: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: GapReason,
}

/// periods that produced a value from only part of the region (or none at all)
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct CoverageRecord {
    pub dataset: DatasetKey,
    pub period: String,
    pub coverage: Coverage,
    pub valid_pixels: u64,
    pub footprint_pixels: u64,
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct MapRecord {
    pub dataset: DatasetKey,
    pub period: Option<String>,
}

/// everything a reader needs to judge the completeness of a report
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct Manifest {
    pub experiment_id: String,
    pub region: String,
    pub region_kind: RegionKind,
    pub provider: String,
    pub generated: DateTime<Utc>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub status: RunStatus,
    pub datasets: Vec<DatasetKey>,
    pub coarsenings: Vec<CoarseningRecord>,
    pub gaps: Vec<GapRecord>,
    pub budget_failures: Vec<BudgetShortfall>,
    pub incomplete_coverage: Vec<CoverageRecord>,
    pub maps: Vec<MapRecord>,
}

impl Manifest {
    pub fn is_complete (&self)->bool {
        self.status == RunStatus::Complete && self.gaps.is_empty() && self.budget_failures.is_empty()
    }

    /// process exit code of a run that produced this manifest (same codes as the error categories).
    /// Only a complete run exits with 0
    pub fn exit_code (&self)->i32 {
        if self.gaps.iter().any( |g| matches!( g.reason, GapReason::ProviderUnavailable(_))) { 3 }
        else if !self.budget_failures.is_empty() { 4 }
        else if self.status == RunStatus::Cancelled || !self.gaps.is_empty() { 1 }
        else { 0 }
    }
}

/* #endregion manifest */

pub struct ReportArtifacts {
    pub experiment_id: String,
    pub region: Arc<Region>,
    pub series: Vec<TimeSeries>,
    pub maps: Vec<MapLayerSpec>,
    pub manifest: Manifest,
}

pub struct ReportBuilder {
    catalog: Arc<RegionCatalog>,
    assembler: TimeSeriesAssembler,
    provider_name: String,
}

impl ReportBuilder {
    pub fn new (catalog: Arc<RegionCatalog>, assembler: TimeSeriesAssembler, provider_name: impl ToString)->Self {
        ReportBuilder { catalog, assembler, provider_name: provider_name.to_string() }
    }

    /// build all series, map layers and the manifest. Configuration errors are reported before the
    /// first provider call, datasets exceeding the pixel budget are skipped and recorded in the manifest
    pub async fn build (&self, request: &ReportRequest, cancel: &CancellationToken)->Result<ReportArtifacts> {
        let region = self.catalog.resolve( request.region_kind, &request.region_name)?;

        let mut prepared: Vec<PreparedSeries> = Vec::with_capacity( request.datasets.len());
        let mut budget_failures = Vec::new();

        for sel in &request.datasets {
            let opts = AssemblyOptions {
                reducer: sel.reducer,
                resolution: request.resolution,
                max_pixels: request.max_pixels,
                season: request.season.clone(),
                keep_rasters: request.include_maps,
            };
            match self.assembler.prepare( &sel.key, &region, request.start, request.end, request.granularity, &opts) {
                Ok(p) => prepared.push( p),
                Err(EoIndicatorsError::BudgetExceeded(shortfall)) => {
                    warn!("skipping dataset {}: {shortfall}", sel.key);
                    budget_failures.push( shortfall);
                }
                Err(e) => return Err(e)
            }
        }

        let mut series = Vec::with_capacity( prepared.len());
        for p in &prepared {
            series.push( self.assembler.run( p, cancel).await);
        }

        let mut maps = Vec::new();
        let mut map_records = Vec::new();
        if request.include_maps {
            for (p, ts) in prepared.iter().zip( series.iter()) {
                let ds = &p.descriptor;
                match ts.latest_full() {
                    Some((period, result)) => {
                        let layer = if let Some(raster) = &result.raster {
                            MapLayer::Raster(raster)
                        } else if !result.samples.is_empty() {
                            MapLayer::Samples( &result.samples)
                        } else {
                            MapLayer::Scalar( result.value)
                        };
                        let style = LayerStyle {
                            title: format!("{} {} {}", ds.key, ts.reducer, period.label),
                            unit: ds.unit.clone(),
                            ramp: ColorRamp::from( &ds.vis),
                            opacity: RASTER_OPACITY,
                        };
                        maps.push( MapComposer::compose( layer, &region, request.basemap, &style));
                        map_records.push( MapRecord { dataset: ds.key, period: Some( period.label.clone()) });
                    }
                    None => {
                        warn!("no fully covered period of {} for map", ds.key);
                        map_records.push( MapRecord { dataset: ds.key, period: None });
                    }
                }
            }
        }

        let manifest = self.manifest( request, &region, &series, budget_failures, map_records, cancel);
        info!("report {} done: {} series, {} maps, {} gaps, {} budget failures, {:?}", request.experiment_id,
            series.len(), maps.len(), manifest.gaps.len(), manifest.budget_failures.len(), manifest.status);

        Ok( ReportArtifacts { experiment_id: request.experiment_id.clone(), region, series, maps, manifest })
    }

    fn manifest (&self, request: &ReportRequest, region: &Region, series: &[TimeSeries], budget_failures: Vec<BudgetShortfall>,
                 maps: Vec<MapRecord>, cancel: &CancellationToken)->Manifest
    {
        let mut coarsenings = Vec::new();
        let mut gaps = Vec::new();
        let mut incomplete_coverage = Vec::new();

        for ts in series {
            if ts.plan.is_coarsened() {
                coarsenings.push( CoarseningRecord { dataset: ts.dataset, plan: ts.plan.clone() });
            }
            for e in &ts.entries {
                if let Some(reason) = e.gap() {
                    gaps.push( GapRecord {
                        dataset: ts.dataset,
                        period: e.period.label.clone(),
                        start: e.period.bounds.start,
                        end: e.period.bounds.end,
                        reason: reason.clone()
                    });
                } else if let Some(r) = e.result() {
                    if r.coverage != Coverage::Full {
                        incomplete_coverage.push( CoverageRecord {
                            dataset: ts.dataset,
                            period: e.period.label.clone(),
                            coverage: r.coverage,
                            valid_pixels: r.valid_pixels,
                            footprint_pixels: r.footprint_pixels
                        });
                    }
                }
            }
        }

        let cancelled = cancel.is_cancelled() || series.iter().any( |ts| ts.is_cancelled());

        Manifest {
            experiment_id: request.experiment_id.clone(),
            region: region.name.clone(),
            region_kind: region.kind,
            provider: self.provider_name.clone(),
            generated: utc_now(),
            start: request.start,
            end: request.end,
            status: if cancelled { RunStatus::Cancelled } else { RunStatus::Complete },
            datasets: series.iter().map( |ts| ts.dataset).collect(),
            coarsenings,
            gaps,
            budget_failures,
            incomplete_coverage,
            maps
        }
    }
}
