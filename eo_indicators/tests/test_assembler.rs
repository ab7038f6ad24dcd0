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

use std::sync::Arc;
use chrono::{Datelike, NaiveDate};
use tokio_util::sync::CancellationToken;

use eo_common::datetime::{millis, secs};
use eo_indicators::{
    EoIndicatorsError,
    assembler::*,
    dataset::{DatasetRegistry, ThresholdPolicy},
    period::{PeriodGranularity, Season},
    reducer::{Reducer, ReducerKind, RetryPolicy},
    region::{GeometryConfig, Region, RegionConfig, RegionKind},
    synthetic::SyntheticProvider,
};

// run with "cargo test -p eo_indicators --test test_assembler -- --nocapture"

fn date (s: &str)->NaiveDate { NaiveDate::parse_from_str( s, "%Y-%m-%d").unwrap() }

fn bbox_region (name: &str, wsen: [f64;4])->Arc<Region> {
    let cfg = RegionConfig {
        name: name.into(), label: None, kind: RegionKind::Local,
        geometry: GeometryConfig::BBox( wsen.to_vec()), crs: None, sampling: None
    };
    Arc::new( Region::try_from_config( &cfg).unwrap())
}

fn permian ()->Arc<Region> { bbox_region( "permian", [-103.0, 31.0, -102.9, 31.1]) }

fn assembler (provider: &Arc<SyntheticProvider>, parallelism: usize)->TimeSeriesAssembler {
    let retry = RetryPolicy { max_attempts: 2, call_timeout: secs(5), retry_delay: millis(1) };
    let reducer = Arc::new( Reducer::new( provider.clone(), retry));
    let thresholds = ThresholdPolicy::new().with( "ch4_ppb", 1900.0).with( "ndsi", 40.0);
    TimeSeriesAssembler::new( reducer, Arc::new( DatasetRegistry::builtin()), Arc::new( thresholds), parallelism)
}

fn opts (reducer: ReducerKind)->AssemblyOptions {
    AssemblyOptions { reducer, resolution: 1000.0, max_pixels: 10_000, season: None, keep_rasters: true }
}

#[tokio::test]
async fn test_gaps_are_kept () {
    let provider = Arc::new( SyntheticProvider::constant( 1850.0)
        .with_failing_window( date("2020-01-01"))
        .with_failing_window( date("2022-01-01")));
    let assembler = assembler( &provider, 4);

    let ts = assembler.assemble( "ch4", &permian(), date("2019-01-01"), date("2024-01-01"), PeriodGranularity::Yearly,
                                 &opts( ReducerKind::Mean), &CancellationToken::new()).await.unwrap();
    for e in &ts.entries { println!("{}: {:?}", e.period.label, e.result().map( |r| r.value)) }

    assert_eq!( ts.entries.len(), 5);
    assert_eq!( ts.status, SeriesStatus::Complete);

    let gaps: Vec<&str> = ts.gaps().iter().map( |(p,_)| p.label.as_str()).collect();
    assert_eq!( gaps, vec!["2020", "2022"]);
    assert!( ts.gaps().iter().all( |(_,r)| matches!( r, GapReason::ProviderUnavailable(_))));

    let values: Vec<Option<f64>> = ts.results().map( |(_,r)| r.value).collect();
    assert_eq!( values, vec![Some(1850.0); 3]);

    assert_eq!( ts.latest_full().unwrap().0.label, "2023");
}

#[tokio::test]
async fn test_order_independent_of_completion () {
    // earlier windows take longer, so they complete last
    let provider = Arc::new( SyntheticProvider::new( |_,d| Some( 1800.0 + d.year() as f64 - 2019.0))
        .with_latency( |w| millis( (2030 - w.start.year()) as u64 * 10)));
    let assembler = assembler( &provider, 5);
    let (start, end) = (date("2019-01-01"), date("2024-01-01"));

    let ts = assembler.assemble( "ch4", &permian(), start, end, PeriodGranularity::Yearly,
                                 &opts( ReducerKind::Max), &CancellationToken::new()).await.unwrap();

    let labels: Vec<&str> = ts.entries.iter().map( |e| e.period.label.as_str()).collect();
    assert_eq!( labels, vec!["2019", "2020", "2021", "2022", "2023"]);

    let values: Vec<f64> = ts.results().filter_map( |(_,r)| r.value).collect();
    assert_eq!( values, vec![1800.0, 1801.0, 1802.0, 1803.0, 1804.0]);

    // periods cover the range without gaps or overlaps
    assert_eq!( ts.entries.first().unwrap().period.bounds.start, start);
    assert_eq!( ts.entries.last().unwrap().period.bounds.end, end);
    for w in ts.entries.windows(2) {
        assert_eq!( w[0].period.bounds.end, w[1].period.bounds.start);
    }
}

#[tokio::test]
async fn test_cancellation () {
    let provider = Arc::new( SyntheticProvider::constant( 1850.0).with_latency( |_| millis(200)));
    let assembler = assembler( &provider, 1);
    let cancel = CancellationToken::new();

    let c = cancel.clone();
    tokio::spawn( async move {
        tokio::time::sleep( millis(50)).await;
        c.cancel();
    });

    let ts = assembler.assemble( "ch4", &permian(), date("2019-01-01"), date("2024-01-01"), PeriodGranularity::Yearly,
                                 &opts( ReducerKind::Mean), &cancel).await.unwrap();
    println!("status: {:?}, gaps: {}", ts.status, ts.gaps().len());

    assert!( ts.is_cancelled());
    assert_eq!( ts.entries.len(), 5);
    assert!( ts.gaps().iter().all( |(_,r)| **r == GapReason::Cancelled));
    assert_eq!( provider.query_count(), 1);
}

#[tokio::test]
async fn test_budget_exceeded_before_provider_calls () {
    let provider = Arc::new( SyntheticProvider::constant( 1850.0));
    let assembler = assembler( &provider, 4);
    let huge = bbox_region( "huge", [0.0, 0.0, 60.0, 60.0]);
    let mut opts = opts( ReducerKind::Mean);
    opts.max_pixels = 300;

    match assembler.prepare( "ch4", &huge, date("2019-01-01"), date("2024-01-01"), PeriodGranularity::Yearly, &opts) {
        Err(EoIndicatorsError::BudgetExceeded(shortfall)) => {
            println!("expected error: {shortfall}");
            assert!( shortfall.pixels_at_max_resolution > 300);
        }
        other => panic!("expected budget failure, got {:?}", other.map( |p| p.plan))
    }
    assert_eq!( provider.query_count(), 0);

    // sst has a much coarser native resolution and gets through by coarsening
    let prepared = assembler.prepare( "sst", &huge, date("2019-01-01"), date("2024-01-01"), PeriodGranularity::Yearly, &opts).unwrap();
    assert!( prepared.plan.is_coarsened());
    assert_eq!( prepared.plan.coarsening_steps, 4);
    assert!( prepared.plan.estimated_pixels <= 300);
}

#[tokio::test]
async fn test_configuration_errors () {
    let provider = Arc::new( SyntheticProvider::constant( 1850.0));
    let assembler = assembler( &provider, 4);
    let region = permian();
    let (start, end) = (date("2019-01-01"), date("2024-01-01"));

    let err = assembler.prepare( "no2", &region, start, end, PeriodGranularity::Yearly, &opts( ReducerKind::Mean)).unwrap_err();
    println!("expected error: {err}");
    assert!( err.is_configuration_error());

    // sst has no configured threshold
    let err = assembler.prepare( "sst", &region, start, end, PeriodGranularity::Yearly, &opts( ReducerKind::CountAboveThreshold)).unwrap_err();
    println!("expected error: {err}");
    assert!( err.is_configuration_error());

    let err = assembler.prepare( "ch4", &region, end, start, PeriodGranularity::Yearly, &opts( ReducerKind::Mean)).unwrap_err();
    assert!( err.is_configuration_error());

    assert_eq!( provider.query_count(), 0);
}

#[tokio::test]
async fn test_seasonal_windows () {
    // snow only in winter months
    let provider = Arc::new( SyntheticProvider::new( |_,d| Some( if d.month() >= 11 || d.month() <= 3 { 80.0 } else { 0.0 }))
        .with_images_per_window(4));
    let assembler = assembler( &provider, 2);
    let alps = bbox_region( "alps", [7.0, 45.9, 7.1, 46.0]);

    let mut opts = opts( ReducerKind::FractionAboveThreshold);
    opts.season = Some( Season::new( "11-01", "04-01").unwrap());

    let ts = assembler.assemble( "snow", &alps, date("2019-01-01"), date("2021-01-01"), PeriodGranularity::Yearly,
                                 &opts, &CancellationToken::new()).await.unwrap();
    assert_eq!( ts.entries.len(), 2);

    let first = &ts.entries[0];
    let window = first.period.window.unwrap();
    assert_eq!( window.start, date("2019-11-01"));
    assert_eq!( window.end, date("2020-04-01"));
    assert_eq!( first.result().unwrap().value, Some(1.0));
}

#[tokio::test]
async fn test_season_outside_range () {
    let provider = Arc::new( SyntheticProvider::constant( 60.0));
    let assembler = assembler( &provider, 2);
    let alps = bbox_region( "alps", [7.0, 45.9, 7.1, 46.0]);

    let mut opts = opts( ReducerKind::Mean);
    opts.season = Some( Season::new( "07-01", "09-01").unwrap());

    // the last period is truncated before the season starts
    let ts = assembler.assemble( "snow", &alps, date("2019-01-01"), date("2020-06-01"), PeriodGranularity::Yearly,
                                 &opts, &CancellationToken::new()).await.unwrap();
    assert_eq!( ts.entries.len(), 2);
    assert!( ts.gaps().is_empty());
    assert_eq!( ts.entries[0].result().unwrap().value, Some(60.0));

    let last = ts.entries[1].result().unwrap();
    assert!( last.is_no_data());
    assert_eq!( last.value, None);
    assert_eq!( provider.query_count(), 1);
}
