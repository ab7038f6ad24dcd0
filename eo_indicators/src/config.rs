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

use std::{collections::HashSet, path::{Path,PathBuf}, time::Duration};
use chrono::NaiveDate;
use serde::{Deserialize,Serialize};
use tracing_subscriber::EnvFilter;

use eo_common::{
    config::{load_config_path, resolve_config_ref},
    datetime::{deserialize_optional_duration, serialize_optional_duration},
    fs::path_safe_name
};
use crate::dataset::ThresholdPolicy;
use crate::errors::{configuration_error, Result};
use crate::map::Basemap;
use crate::period::{PeriodGranularity, Season};
use crate::reducer::{ReducerKind, RetryPolicy};
use crate::region::RegionKind;

fn default_reducer()->ReducerKind { ReducerKind::Mean }
fn default_basemap()->Basemap { Basemap::CartoDbPositron }
fn default_true()->bool { true }
fn default_log_level()->String { "info".into() }
fn default_parallelism()->usize { 4 }
fn default_map_file_name()->String { "map.json".into() }
fn default_chart_file_name()->String { "chart.csv".into() }
fn default_manifest_file_name()->String { "manifest.json".into() }

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct DatasetSelection {
    pub key: String,
    #[serde(default="default_reducer")]
    pub reducer: ReducerKind,
}

/// where artifacts go. Artifact file names are prefixed with the experiment id
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct OutputConfig {
    pub dir: String,
    #[serde(default="default_map_file_name")]
    pub map_file_name: String,
    #[serde(default="default_chart_file_name")]
    pub chart_file_name: String,
    #[serde(default="default_manifest_file_name")]
    pub manifest_file_name: String,
    /// console only logging if not set
    #[serde(default)]
    pub log_dir: Option<String>,
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct ExecutionConfig {
    /// max number of periods that are reduced concurrently
    #[serde(default="default_parallelism")]
    pub parallelism: usize,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// cancel the run after this time
    #[serde(default, deserialize_with="deserialize_optional_duration", serialize_with="serialize_optional_duration")]
    pub deadline: Option<Duration>,
}

impl Default for ExecutionConfig {
    fn default()->Self {
        ExecutionConfig { parallelism: default_parallelism(), retry: RetryPolicy::default(), deadline: None }
    }
}

/// the complete description of a report run
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct ReportConfig {
    pub project: String,
    pub experiment_id: String,

    pub datasets: Vec<DatasetSelection>,

    pub region_mode: RegionKind,
    pub region_name: String,
    /// region table, relative paths are resolved against the directory of the report config
    pub region_file: String,

    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: PeriodGranularity,
    #[serde(default)]
    pub season: Option<Season>,

    /// requested resolution in m/px
    pub resolution: f64,
    pub max_pixels: u64,

    #[serde(default)]
    pub thresholds: ThresholdPolicy,

    #[serde(default="default_basemap")]
    pub basemap: Basemap,
    #[serde(default="default_true")]
    pub include_maps: bool,

    pub output: OutputConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    /// root of a local imagery archive
    #[serde(default)]
    pub archive_dir: Option<String>,

    #[serde(default="default_log_level")]
    pub log_level: String,
}

impl ReportConfig {
    /// everything we can check without resolving regions or datasets
    pub fn validate (&self)->Result<()> {
        if self.experiment_id.trim().is_empty() {
            return Err( configuration_error( "empty experiment_id"))
        }
        if path_safe_name( &self.experiment_id) != self.experiment_id {
            return Err( configuration_error( format!("experiment_id '{}' is not usable as a filename prefix", self.experiment_id)))
        }
        if self.datasets.is_empty() {
            return Err( configuration_error( "no datasets selected"))
        }
        let mut seen = HashSet::new();
        for sel in &self.datasets {
            if !seen.insert( (sel.key.to_lowercase(), sel.reducer)) {
                return Err( configuration_error( format!("duplicate dataset selection {} {}", sel.key, sel.reducer)))
            }
        }
        if self.region_name.trim().is_empty() {
            return Err( configuration_error( "empty region_name"))
        }
        if self.start >= self.end {
            return Err( configuration_error( format!("start {} not before end {}", self.start, self.end)))
        }
        if let Some(season) = &self.season {
            season.check()?;
            if self.granularity != PeriodGranularity::Yearly {
                return Err( configuration_error( "seasons require yearly granularity"))
            }
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err( configuration_error( format!("invalid resolution {}", self.resolution)))
        }
        if self.max_pixels == 0 {
            return Err( configuration_error( "max_pixels has to be positive"))
        }
        if self.execution.parallelism == 0 {
            return Err( configuration_error( "parallelism has to be positive"))
        }
        if self.execution.retry.max_attempts == 0 {
            return Err( configuration_error( "max_attempts has to be positive"))
        }
        if self.execution.retry.call_timeout.is_zero() {
            return Err( configuration_error( "zero call_timeout"))
        }
        if EnvFilter::try_new( &self.log_level).is_err() {
            return Err( configuration_error( format!("invalid log level '{}'", self.log_level)))
        }
        Ok(())
    }

    pub fn region_file_path (&self, config_path: impl AsRef<Path>)->PathBuf {
        resolve_config_ref( config_path, &self.region_file)
    }

    pub fn archive_path (&self, config_path: impl AsRef<Path>)->Option<PathBuf> {
        self.archive_dir.as_ref().map( |dir| resolve_config_ref( config_path, dir))
    }

    pub fn output_path (&self, config_path: impl AsRef<Path>)->PathBuf {
        resolve_config_ref( config_path, &self.output.dir)
    }

    /// `<experiment_id>_<name>`
    pub fn artifact_name (&self, name: &str)->String {
        format!("{}_{}", self.experiment_id, name)
    }
}

/// load and validate a report config
pub fn load_report_config (path: impl AsRef<Path>)->Result<ReportConfig> {
    let config: ReportConfig = load_config_path( path)?;
    config.validate()?;
    Ok(config)
}
