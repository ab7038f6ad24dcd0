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

use std::path::{Path,PathBuf};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use eo_common::fs::{ensure_writable_dir, set_filepath_contents};
use crate::assembler::TimeSeries;
use crate::config::OutputConfig;
use crate::dataset::DatasetKey;
use crate::errors::{op_failed, Result};
use crate::reducer::{Coverage, ReducerKind};
use crate::report::ReportArtifacts;

#[derive(Debug,Clone)]
pub struct ArtifactPaths {
    pub map: Option<PathBuf>,
    pub chart: PathBuf,
    pub manifest: PathBuf,
}

#[derive(Serialize)]
struct ChartRow<'a> {
    dataset: DatasetKey,
    reducer: ReducerKind,
    unit: &'a str,
    period: &'a str,
    start: NaiveDate,
    end: NaiveDate,
    value: Option<f64>,
    coverage: Option<Coverage>,
    valid_pixels: Option<u64>,
    footprint_pixels: Option<u64>,
    gap: Option<String>,
}

/// one CSV row per (dataset,period), gaps included with an empty value
pub fn chart_csv (series: &[TimeSeries])->Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer( Vec::new());

    for ts in series {
        for e in &ts.entries {
            let result = e.result();
            wtr.serialize( ChartRow {
                dataset: ts.dataset,
                reducer: ts.reducer,
                unit: &ts.unit,
                period: &e.period.label,
                start: e.period.bounds.start,
                end: e.period.bounds.end,
                value: result.and_then( |r| r.value),
                coverage: result.map( |r| r.coverage),
                valid_pixels: result.map( |r| r.valid_pixels),
                footprint_pixels: result.map( |r| r.footprint_pixels),
                gap: e.gap().map( |g| g.to_string()),
            })?;
        }
    }

    wtr.into_inner().map_err( |e| op_failed( format!("chart data: {e}")))
}

/// write map layers (if any), chart data and manifest as `<experiment_id>_<name>` into `dir`
pub fn write_artifacts (artifacts: &ReportArtifacts, dir: impl AsRef<Path>, output: &OutputConfig)->Result<ArtifactPaths> {
    let dir = dir.as_ref();
    ensure_writable_dir( dir)?;
    let exp = &artifacts.experiment_id;

    let map = if artifacts.maps.is_empty() {
        None
    } else {
        let json = serde_json::to_vec_pretty( &artifacts.maps)?;
        Some( set_filepath_contents( dir, &format!("{exp}_{}", output.map_file_name), &json)?)
    };

    let csv = chart_csv( &artifacts.series)?;
    let chart = set_filepath_contents( dir, &format!("{exp}_{}", output.chart_file_name), &csv)?;

    let json = serde_json::to_vec_pretty( &artifacts.manifest)?;
    let manifest = set_filepath_contents( dir, &format!("{exp}_{}", output.manifest_file_name), &json)?;

    info!("artifacts of {exp} written to {:?}", dir);
    Ok( ArtifactPaths { map, chart, manifest })
}
