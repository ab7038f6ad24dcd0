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

use std::{path::Path, sync::Arc};
use chrono::NaiveDate;

use eo_common::{datetime::secs, fs::{ensure_dir, set_filepath_contents}, geo::GeoRect};
use eo_indicators::{
    archive::{ArchiveGrid, LocalArchiveProvider},
    assembler::GapReason,
    dataset::{builtin_descriptor, DatasetKey},
    period::TimeWindow,
    provider::ImageryProvider,
    reducer::{Coverage, Reducer, ReducerKind, ReductionRequest, RetryPolicy},
    region::{GeometryConfig, Region, RegionConfig, RegionKind},
};

fn date (s: &str)->NaiveDate { NaiveDate::parse_from_str( s, "%Y-%m-%d").unwrap() }

fn write_grid (dir: &Path, day: &str, value: f64, nodata: Option<f64>) {
    let grid = ArchiveGrid {
        bounds: GeoRect::from_wsen_degrees( -1.0, -1.0, 1.0, 1.0),
        width: 2, height: 2, nodata,
        values: vec![value; 4]
    };
    ensure_dir( dir).unwrap();
    set_filepath_contents( dir, &format!("{day}.json"), &serde_json::to_vec( &grid).unwrap()).unwrap();
}

fn small_region ()->Arc<Region> {
    let cfg = RegionConfig {
        name: "small".into(), label: None, kind: RegionKind::Local,
        geometry: GeometryConfig::BBox( vec![0.0, 0.0, 0.1, 0.1]), crs: None, sampling: None
    };
    Arc::new( Region::try_from_config( &cfg).unwrap())
}

#[tokio::test]
async fn test_archive_composite () {
    let root = tempfile::tempdir().unwrap();
    let provider = Arc::new( LocalArchiveProvider::new( root.path()).unwrap());
    let ch4 = Arc::new( builtin_descriptor( DatasetKey::Ch4));

    let band_dir = provider.band_dir( &ch4.collection_id, &ch4.band);
    println!("archive band dir: {band_dir:?}");
    write_grid( &band_dir, "2020-03-01", 1800.0, None);
    write_grid( &band_dir, "2020-06-01", 1900.0, None);
    write_grid( &band_dir, "2020-09-01", -9999.0, Some(-9999.0)); // all nodata
    write_grid( &band_dir, "2021-01-01", 2400.0, None);            // outside window

    let window = TimeWindow::new( date("2020-01-01"), date("2021-01-01")).unwrap();
    let region = small_region();
    let imagery = provider.query_collection( &ch4.collection_id, &ch4.band, &region.geometry, &window).await.unwrap();
    assert_eq!( imagery.len(), 3);

    let reducer = Reducer::new( provider.clone(), RetryPolicy::no_retry( secs(5)));
    let req = ReductionRequest {
        dataset: ch4, region, window, resolution: 1000.0, max_pixels: 10_000,
        reducer: ReducerKind::Mean, threshold: None, keep_raster: false
    };
    let res = reducer.reduce( &req).await.unwrap();
    println!("{res:?}");

    assert_eq!( res.images, 3);
    assert_eq!( res.coverage, Coverage::Full);
    assert_eq!( res.value, Some(1850.0));
    assert!( res.raster.is_none());
}

#[tokio::test]
async fn test_archive_without_imagery () {
    let root = tempfile::tempdir().unwrap();
    let provider = Arc::new( LocalArchiveProvider::new( root.path()).unwrap());
    let ch4 = Arc::new( builtin_descriptor( DatasetKey::Ch4));
    let band_dir = provider.band_dir( &ch4.collection_id, &ch4.band);
    write_grid( &band_dir, "2019-06-01", 1800.0, None);

    let reducer = Reducer::new( provider.clone(), RetryPolicy::no_retry( secs(5)));
    let req = ReductionRequest {
        dataset: ch4, region: small_region(),
        window: TimeWindow::new( date("2022-01-01"), date("2023-01-01")).unwrap(),
        resolution: 1000.0, max_pixels: 10_000, reducer: ReducerKind::Mean, threshold: None, keep_raster: false
    };
    let res = reducer.reduce( &req).await.unwrap();
    assert!( res.is_no_data());
    assert_eq!( res.images, 0);
    assert!( res.footprint_pixels > 0);
}

#[tokio::test]
async fn test_corrupted_grid_is_a_gap () {
    let root = tempfile::tempdir().unwrap();
    let provider = Arc::new( LocalArchiveProvider::new( root.path()).unwrap());
    let ch4 = Arc::new( builtin_descriptor( DatasetKey::Ch4));
    let band_dir = provider.band_dir( &ch4.collection_id, &ch4.band);
    ensure_dir( &band_dir).unwrap();
    set_filepath_contents( &band_dir, "2020-03-01.json", b"not a grid").unwrap();

    let reducer = Reducer::new( provider.clone(), RetryPolicy::no_retry( secs(5)));
    let req = ReductionRequest {
        dataset: ch4, region: small_region(),
        window: TimeWindow::new( date("2020-01-01"), date("2021-01-01")).unwrap(),
        resolution: 1000.0, max_pixels: 10_000, reducer: ReducerKind::Mean, threshold: None, keep_raster: false
    };
    let err = reducer.reduce( &req).await.unwrap_err();
    println!("expected error: {err}");
    assert!( !err.is_transient());
    assert!( matches!( GapReason::from( &err), GapReason::Failed(_)));
}

#[test]
fn test_missing_archive () {
    let err = LocalArchiveProvider::new( "/nonexistent/eo-archive").err().unwrap();
    assert!( err.is_configuration_error());
}
