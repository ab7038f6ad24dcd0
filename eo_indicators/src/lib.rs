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

//! Region-time aggregation of satellite derived environmental indicators (methane, snow cover,
//! land surface and sea surface temperature).
//!
//! A report run resolves a named [`region::Region`] and a set of [`dataset::DatasetDescriptor`]s,
//! partitions the requested date range into periods and reduces each (dataset, region, period)
//! triple to a single value through an [`provider::ImageryProvider`]. Results are assembled into
//! [`assembler::TimeSeries`], map layer specifications and a [`report::Manifest`] that records
//! everything that did not go as requested (resolution coarsening, gaps, budget failures).

use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;

pub mod dataset;
pub mod period;
pub mod sampling;
pub mod region;
pub mod provider;
pub mod synthetic;
pub mod archive;
pub mod reducer;
pub mod assembler;
pub mod map;
pub mod report;
pub mod artifacts;
pub mod config;
pub mod logging;

mod errors;
pub use errors::*;

use artifacts::{write_artifacts, ArtifactPaths};
use assembler::TimeSeriesAssembler;
use config::ReportConfig;
use dataset::DatasetRegistry;
use provider::ImageryProvider;
use reducer::Reducer;
use region::RegionCatalog;
use report::{ReportArtifacts, ReportBuilder, ReportRequest};

/// run a complete report for a validated config and write its artifacts. Relative paths
/// in the config are resolved against `config_path`
pub async fn run_report (config: &ReportConfig, config_path: &Path, provider: Arc<dyn ImageryProvider>, cancel: &CancellationToken)
    ->Result<(ReportArtifacts,ArtifactPaths)>
{
    config.validate()?;

    let catalog = Arc::new( RegionCatalog::load( config.region_file_path( config_path))?);
    let registry = Arc::new( DatasetRegistry::builtin());
    let thresholds = Arc::new( config.thresholds.clone());
    let provider_name = provider.name().to_string();

    let reducer = Arc::new( Reducer::new( provider, config.execution.retry.clone()));
    let assembler = TimeSeriesAssembler::new( reducer, registry, thresholds, config.execution.parallelism);
    let builder = ReportBuilder::new( catalog, assembler, provider_name);

    let artifacts = builder.build( &ReportRequest::from( config), cancel).await?;
    let paths = write_artifacts( &artifacts, config.output_path( config_path), &config.output)?;

    Ok( (artifacts, paths))
}
