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

use std::{sync::Arc, time::Duration};
use chrono::NaiveDate;

use eo_common::{datetime::{millis, secs}, geo::{meters_per_degree, GeoPoint}};
use eo_indicators::{
    EoIndicatorsError,
    dataset::{builtin_descriptor, DatasetDescriptor, DatasetKey},
    period::TimeWindow,
    provider::RegionSample,
    reducer::*,
    region::{GeometryConfig, Region, RegionConfig, RegionKind},
    sampling::GlobalSampling,
    synthetic::SyntheticProvider,
};

// run with "cargo test -p eo_indicators --test test_reducer -- --nocapture"

/// side length of the test square in degrees (at the equator)
fn deg (meters: f64)->f64 { meters / meters_per_degree() }

fn square_region (side_m: f64)->Arc<Region> {
    let d = deg( side_m);
    let cfg = RegionConfig {
        name: "square".into(), label: None, kind: RegionKind::Local,
        geometry: GeometryConfig::BBox( vec![0.0, -d/2.0, d, d/2.0]),
        crs: None, sampling: None
    };
    Arc::new( Region::try_from_config( &cfg).unwrap())
}

fn ch4_1000 ()->Arc<DatasetDescriptor> {
    let mut ds = builtin_descriptor( DatasetKey::Ch4);
    ds.native_resolution = 1000.0;
    ds.max_resolution = 64_000.0;
    Arc::new(ds)
}

fn window (year: i32)->TimeWindow {
    TimeWindow::new( NaiveDate::from_ymd_opt( year, 1, 1).unwrap(), NaiveDate::from_ymd_opt( year+1, 1, 1).unwrap()).unwrap()
}

fn request (dataset: Arc<DatasetDescriptor>, region: Arc<Region>, reducer: ReducerKind, threshold: Option<f64>)->ReductionRequest {
    ReductionRequest { dataset, region, window: window(2020), resolution: 1000.0, max_pixels: 50, reducer, threshold, keep_raster: true }
}

fn reducer_for (provider: &Arc<SyntheticProvider>, retry: RetryPolicy)->Reducer {
    Reducer::new( provider.clone(), retry)
}

#[test]
fn test_resolution_plan () {
    let region = square_region( 10_000.0);
    let area = region.geometry.area_m2();
    println!("area: {area} m²");

    let plan = ResolutionPlan::compute( DatasetKey::Ch4, area, 1000.0, 1000.0, 64_000.0, 50).unwrap();
    println!("{plan:?}");
    assert_eq!( plan.base, 1000.0);
    assert_eq!( plan.effective, 2000.0);
    assert_eq!( plan.coarsening_steps, 1);
    assert_eq!( plan.estimated_pixels, 25);
    assert!( plan.is_coarsened());

    // deterministic
    let plan1 = ResolutionPlan::compute( DatasetKey::Ch4, area, 1000.0, 1000.0, 64_000.0, 50).unwrap();
    assert_eq!( plan, plan1);

    // requested resolution finer than native is never used
    let plan = ResolutionPlan::compute( DatasetKey::Ch4, area, 10.0, 1000.0, 64_000.0, 1000).unwrap();
    assert_eq!( plan.effective, 1000.0);
    assert!( !plan.is_coarsened());

    let shortfall = ResolutionPlan::compute( DatasetKey::Ch4, 1.0e12, 1000.0, 1000.0, 4000.0, 50).unwrap_err();
    println!("{shortfall}");
    assert_eq!( shortfall.pixels_at_max_resolution, 62_500);
}

#[test]
fn test_plan_capped_at_max_resolution () {
    // 1500 m/px doublings skip over the 256 km/px maximum, which still fits the budget
    let plan = ResolutionPlan::compute( DatasetKey::Snow, 4.84e10, 1500.0, 500.0, 256_000.0, 1).unwrap();
    println!("{plan:?}");
    assert!( plan.capped);
    assert_eq!( plan.effective, 256_000.0);
    assert_eq!( plan.coarsening_steps, 8);
    assert_eq!( plan.estimated_pixels, 1);

    let json = serde_json::to_string( &plan).unwrap();
    let plan1: ResolutionPlan = serde_json::from_str( &json).unwrap();
    assert_eq!( plan1.rederive_effective(), 256_000.0);

    // not even the max resolution fits
    let shortfall = ResolutionPlan::compute( DatasetKey::Snow, 4.84e11, 1500.0, 500.0, 256_000.0, 1).unwrap_err();
    assert_eq!( shortfall.pixels_at_max_resolution, 8);
    assert!( shortfall.pixels_at_max_resolution > shortfall.max_pixels);

    // exact power of two multiples are never capped
    let plan = ResolutionPlan::compute( DatasetKey::Snow, 4.84e10, 500.0, 500.0, 256_000.0, 1).unwrap();
    assert!( !plan.capped);
    assert_eq!( plan.rederive_effective(), plan.effective);
}

#[test]
fn test_manifest_plan_roundtrip () {
    let plan = ResolutionPlan::compute( DatasetKey::Ch4, 3.3e9, 500.0, 1113.2, 284_979.2, 1000).unwrap();
    let json = serde_json::to_string( &plan).unwrap();
    println!("{json}");

    let plan1: ResolutionPlan = serde_json::from_str( &json).unwrap();
    assert_eq!( plan1.rederive_effective(), plan.effective);
    assert_eq!( plan1, plan);
}

#[tokio::test]
async fn test_count_above_threshold () {
    let d = deg( 10_000.0);
    // 2 of 5 grid columns above 1700 ppb
    let provider = Arc::new( SyntheticProvider::new( move |p,_| Some( if p.lon() < 0.4 * d { 1800.0 } else { 1650.0 })));
    let reducer = reducer_for( &provider, RetryPolicy::no_retry( secs(5)));

    let req = request( ch4_1000(), square_region( 10_000.0), ReducerKind::CountAboveThreshold, Some(1700.0));
    let res = reducer.reduce( &req).await.unwrap();
    println!("{res:?}");

    assert_eq!( res.effective_resolution, 2000.0);
    assert_eq!( res.footprint_pixels, 25);
    assert_eq!( res.valid_pixels, 25);
    assert_eq!( res.coverage, Coverage::Full);
    assert_eq!( res.value, Some( 0.4 * res.valid_pixels as f64));
    assert_eq!( res.above_threshold, Some(10));

    let raster = res.raster.as_ref().unwrap();
    assert_eq!( (raster.width, raster.height), (5, 5));
    assert_eq!( raster.values[0], Some(1800.0));
    assert_eq!( raster.values[4], Some(1650.0));

    // same request again yields the same result
    let res1 = reducer.reduce( &req).await.unwrap();
    assert_eq!( res1.value, res.value);
    assert_eq!( res1.effective_resolution, res.effective_resolution);
    assert_eq!( provider.query_count(), 2);
}

#[tokio::test]
async fn test_no_data_is_not_zero () {
    let empty = Arc::new( SyntheticProvider::new( |_,_| None));
    let reducer = reducer_for( &empty, RetryPolicy::no_retry( secs(5)));
    let req = request( ch4_1000(), square_region( 10_000.0), ReducerKind::Mean, None);
    let res = reducer.reduce( &req).await.unwrap();
    assert_eq!( res.value, None);
    assert_eq!( res.valid_pixels, 0);
    assert_eq!( res.footprint_pixels, 25);
    assert!( res.is_no_data());

    let zero = Arc::new( SyntheticProvider::constant( 0.0));
    let reducer = reducer_for( &zero, RetryPolicy::no_retry( secs(5)));
    let snow = Arc::new( builtin_descriptor( DatasetKey::Snow));
    let res = reducer.reduce( &request( snow, square_region( 10_000.0), ReducerKind::Mean, None)).await.unwrap();
    assert_eq!( res.value, Some(0.0));
    assert_eq!( res.coverage, Coverage::Full);
}

#[tokio::test]
async fn test_partial_coverage_and_masking () {
    let d = deg( 10_000.0);
    // west 2 columns valid, center column out of valid range, east 2 columns missing
    let provider = Arc::new( SyntheticProvider::new( move |p,_| {
        if p.lon() < 0.4 * d { Some(1800.0) } else if p.lon() < 0.6 * d { Some(9999.0) } else { None }
    }));
    let reducer = reducer_for( &provider, RetryPolicy::no_retry( secs(5)));
    let res = reducer.reduce( &request( ch4_1000(), square_region( 10_000.0), ReducerKind::Mean, None)).await.unwrap();
    println!("{res:?}");

    assert_eq!( res.coverage, Coverage::Partial);
    assert_eq!( res.valid_pixels, 10);
    assert_eq!( res.footprint_pixels, 25);
    assert_eq!( res.value, Some(1800.0));
    assert!( (res.coverage_fraction() - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn test_outside_temporal_coverage () {
    let provider = Arc::new( SyntheticProvider::constant( 1800.0));
    let reducer = reducer_for( &provider, RetryPolicy::no_retry( secs(5)));
    let mut req = request( ch4_1000(), square_region( 10_000.0), ReducerKind::Mean, None);
    req.window = window(2010);

    let res = reducer.reduce( &req).await.unwrap();
    assert!( res.is_no_data());
    assert_eq!( provider.query_count(), 0);
}

#[tokio::test]
async fn test_threshold_required () {
    let provider = Arc::new( SyntheticProvider::constant( 1800.0));
    let reducer = reducer_for( &provider, RetryPolicy::no_retry( secs(5)));
    let req = request( ch4_1000(), square_region( 10_000.0), ReducerKind::FractionAboveThreshold, None);
    assert!( reducer.reduce( &req).await.unwrap_err().is_configuration_error());
    assert_eq!( provider.query_count(), 0);
}

#[tokio::test]
async fn test_retry_transient_failures () {
    let provider = Arc::new( SyntheticProvider::constant( 1800.0).with_flaky_window( window(2020).start, 2));
    let retry = RetryPolicy { max_attempts: 3, call_timeout: secs(5), retry_delay: millis(10) };
    let reducer = reducer_for( &provider, retry);

    let res = reducer.reduce( &request( ch4_1000(), square_region( 10_000.0), ReducerKind::Mean, None)).await.unwrap();
    assert_eq!( res.value, Some(1800.0));
    assert_eq!( provider.query_count(), 3);
}

#[test]
fn test_retry_backoff () {
    let retry = RetryPolicy { max_attempts: 100, call_timeout: secs(5), retry_delay: millis(10) };
    assert_eq!( retry.backoff(1), millis(10));
    assert_eq!( retry.backoff(2), millis(20));
    assert_eq!( retry.backoff(4), millis(80));

    // large attempt numbers saturate instead of overflowing
    assert!( retry.backoff(u32::MAX) >= retry.backoff(33));
    let retry = RetryPolicy { retry_delay: Duration::MAX, ..retry };
    assert_eq!( retry.backoff(2), Duration::MAX);
}

#[tokio::test]
async fn test_timeout_exhausts_retries () {
    let provider = Arc::new( SyntheticProvider::constant( 1800.0).with_latency( |_| Duration::from_millis(300)));
    let retry = RetryPolicy { max_attempts: 2, call_timeout: millis(20), retry_delay: millis(5) };
    let reducer = reducer_for( &provider, retry);

    let err = reducer.reduce( &request( ch4_1000(), square_region( 10_000.0), ReducerKind::Mean, None)).await.unwrap_err();
    println!("expected error: {err}");
    assert!( matches!( err, EoIndicatorsError::ProviderUnavailable(_)));
    assert_eq!( provider.query_count(), 2);
}

#[tokio::test]
async fn test_diagonal_strip () {
    // thin diagonal strip, its bounding box has about 100 times more cells than the strip itself
    let cfg = RegionConfig {
        name: "strip".into(), label: None, kind: RegionKind::Local,
        geometry: GeometryConfig::Polygon( vec![
            GeoPoint::from_lon_lat_degrees( 0.0, 0.0),
            GeoPoint::from_lon_lat_degrees( 1.0, 1.0),
            GeoPoint::from_lon_lat_degrees( 1.0, 1.01),
            GeoPoint::from_lon_lat_degrees( 0.0, 0.01),
        ]),
        crs: None, sampling: None
    };
    let strip = Arc::new( Region::try_from_config( &cfg).unwrap());

    let provider = Arc::new( SyntheticProvider::constant( 1850.0));
    let reducer = reducer_for( &provider, RetryPolicy::no_retry( secs(5)));
    let req = ReductionRequest {
        dataset: Arc::new( builtin_descriptor( DatasetKey::Ch4)), region: strip.clone(), window: window(2020),
        resolution: 1000.0, max_pixels: 1000, reducer: ReducerKind::Mean, threshold: None, keep_raster: false
    };

    let plan = reducer.plan( &req).unwrap();
    println!("{plan:?}");
    assert!( !plan.is_coarsened());

    let sample = RegionSample::grid( &strip.geometry, plan.effective, plan.max_pixels, |_| Some(1.0)).unwrap();
    println!("grid {}x{}, {} inside", sample.width, sample.height, sample.footprint());
    assert!( (sample.width * sample.height) as u64 > 4 * plan.max_pixels);
    assert!( sample.footprint() > 0 && (sample.footprint() as u64) < plan.max_pixels);

    let res = reducer.reduce( &req).await.unwrap();
    assert_eq!( res.coverage, Coverage::Full);
    assert_eq!( res.value, Some(1850.0));
    assert_eq!( res.footprint_pixels, sample.footprint() as u64);
}

#[tokio::test]
async fn test_sampled_region () {
    let cfg = RegionConfig {
        name: "world".into(), label: None, kind: RegionKind::Global,
        geometry: GeometryConfig::BBox( vec![-180.0, -60.0, 180.0, 75.0]),
        crs: None, sampling: Some( GlobalSampling::new( 10, 2.0))
    };
    let world = Arc::new( Region::try_from_config( &cfg).unwrap());

    let provider = Arc::new( SyntheticProvider::constant( 1800.0));
    let reducer = reducer_for( &provider, RetryPolicy::no_retry( secs(5)));
    let ch4 = Arc::new( builtin_descriptor( DatasetKey::Ch4));
    let req = ReductionRequest {
        dataset: ch4, region: world, window: window(2021), resolution: 1000.0, max_pixels: 1000,
        reducer: ReducerKind::Mean, threshold: None, keep_raster: true
    };

    let plan = reducer.plan( &req).unwrap();
    println!("{plan:?}");
    assert!( plan.is_coarsened());
    assert!( plan.estimated_pixels <= 1000);

    let res = reducer.reduce( &req).await.unwrap();
    assert_eq!( res.value, Some(1800.0));
    assert_eq!( res.samples.len(), 10);
    assert!( res.samples.iter().all( |s| s.value == Some(1800.0) && s.valid_pixels > 0));
    assert!( res.raster.is_none());
    assert_eq!( provider.query_count(), 10);
}
