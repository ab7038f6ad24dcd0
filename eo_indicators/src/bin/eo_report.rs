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

use std::{path::PathBuf, sync::Arc};
use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info,warn};

use eo_common::{config::resolve_config_ref, define_cli};
use eo_indicators::{
    run_report, EoIndicatorsError,
    archive::LocalArchiveProvider,
    config::{load_report_config, ReportConfig},
    dataset::DatasetRegistry,
    logging::{init_tracing, log_file_path},
    provider::ImageryProvider,
    region::RegionCatalog,
    synthetic::SyntheticProvider,
};

define_cli! { ARGS [about="eo_report - time series, map layers and manifest of satellite indicators over a region"] =
    archive: Option<PathBuf> [help="local imagery archive directory (overrides config)", long, short],
    synthetic: Option<f64> [help="use a synthetic provider with this constant raw value instead of an archive", long],
    dry_run: bool [help="only check config, region and datasets", long],
    config: PathBuf [help="pathname of report config (RON)"]
}

#[tokio::main]
async fn main () {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            let code = e.downcast_ref::<EoIndicatorsError>().map( |e| e.exit_code()).unwrap_or(1);
            std::process::exit(code)
        }
    }
}

async fn run ()->Result<i32> {
    let config = load_report_config( &ARGS.config)?;

    let log_file = config.output.log_dir.as_ref()
        .map( |dir| log_file_path( resolve_config_ref( &ARGS.config, dir), &config.experiment_id));
    init_tracing( &config.log_level, log_file.as_deref())?;
    info!("starting report {} of project {}", config.experiment_id, config.project);

    if ARGS.dry_run {
        check_config( &config)?;
        println!("config {:?} is valid", ARGS.config);
        return Ok(0)
    }

    let provider = create_provider( &config)?;
    let cancel = CancellationToken::new();
    spawn_cancel_triggers( &config, &cancel);

    let (artifacts, paths) = run_report( &config, &ARGS.config, provider, &cancel).await?;

    if let Some(map) = &paths.map { println!("map layers: {}", map.display()) }
    println!("chart data: {}", paths.chart.display());
    println!("manifest:   {}", paths.manifest.display());

    let manifest = &artifacts.manifest;
    if !manifest.is_complete() {
        warn!("report incomplete: {} gaps, {} budget failures, {:?}", manifest.gaps.len(), manifest.budget_failures.len(), manifest.status);
    }
    Ok( manifest.exit_code())
}

/// resolve region and datasets without touching any provider
fn check_config (config: &ReportConfig)->Result<()> {
    let catalog = RegionCatalog::load( config.region_file_path( &ARGS.config))?;
    let region = catalog.resolve( config.region_mode, &config.region_name)?;
    println!("region {} ({}): {:.1} km²", region.name, region.label, region.geometry.area_m2() / 1.0e6);

    let registry = DatasetRegistry::builtin();
    for sel in &config.datasets {
        let ds = registry.describe( &sel.key)?;
        println!("dataset {} {}: {} / {}", ds.key, sel.reducer, ds.collection_id, ds.band);
    }
    Ok(())
}

fn create_provider (config: &ReportConfig)->Result<Arc<dyn ImageryProvider>> {
    if let Some(v) = ARGS.synthetic {
        return Ok( Arc::new( SyntheticProvider::constant(v)))
    }

    let archive = ARGS.archive.clone().or_else( || config.archive_path( &ARGS.config))
        .ok_or_else( || anyhow!( EoIndicatorsError::ConfigurationError( "no imagery archive configured".into())))?;
    Ok( Arc::new( LocalArchiveProvider::new( archive)?))
}

/// cancel on Ctrl-C or when the configured deadline expires
fn spawn_cancel_triggers (config: &ReportConfig, cancel: &CancellationToken) {
    let token = cancel.clone();
    tokio::spawn( async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling report");
            token.cancel();
        }
    });

    if let Some(deadline) = config.execution.deadline {
        let token = cancel.clone();
        tokio::spawn( async move {
            tokio::time::sleep( deadline).await;
            warn!("deadline of {deadline:?} expired, cancelling report");
            token.cancel();
        });
    }
}
