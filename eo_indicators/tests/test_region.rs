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
use eo_common::config::config_from_str;
use eo_indicators::EoIndicatorsError;
use eo_indicators::region::*;

// run with "cargo test -p eo_indicators --test test_region -- --nocapture"

const REGIONS: &str = r#"
RegionTable(
    regions: [
        ( name: "square", kind: Local, geometry: BBox([0.0, 0.0, 0.1, 0.1]) ),
        ( name: "bowtie", kind: Local, geometry: Polygon([
            (lon: 10.0, lat: 45.0), (lon: 10.1, lat: 45.1), (lon: 10.1, lat: 45.0), (lon: 10.0, lat: 45.1)
        ])),
        ( name: "lhasa", label: Some("Lhasa"), kind: Local, geometry: Circle( center: (lon: 91.13, lat: 29.65), radius: 50000.0 ) ),
        ( name: "world", kind: Global, geometry: BBox([-180.0, -60.0, 180.0, 75.0]), sampling: Some(( points: 10, size_deg: 2.0 )) ),
        ( name: "projected", kind: Local, geometry: BBox([0.0, 0.0, 1.0, 1.0]), crs: Some("EPSG:3857") ),
        ( name: "inverted", kind: Local, geometry: BBox([1.0, 0.0, 0.0, 1.0]) ),
        ( name: "sampled_local", kind: Local, geometry: BBox([0.0, 0.0, 10.0, 10.0]), sampling: Some(( points: 3, size_deg: 1.0 )) ),
    ]
)
"#;

fn catalog ()->RegionCatalog {
    let table: RegionTable = config_from_str( REGIONS).unwrap();
    RegionCatalog::from_table( &table).unwrap()
}

fn assert_config_error (res: eo_indicators::Result<Arc<Region>>, fragment: &str) {
    match res {
        Err(EoIndicatorsError::ConfigurationError(msg)) => {
            println!("expected error: {msg}");
            assert!( msg.contains(fragment), "'{msg}' does not contain '{fragment}'");
        }
        Err(e) => panic!("wrong error type: {e:?}"),
        Ok(r) => panic!("region {} should not resolve", r.name),
    }
}

#[test]
fn test_resolve_valid () {
    let catalog = catalog();
    assert_eq!( catalog.len(), 7);

    let square = catalog.resolve( RegionKind::Local, "square").unwrap();
    let a = square.geometry.area_m2();
    println!("square area: {a} m²");
    assert!( a > 1.2e8 && a < 1.25e8);
    assert_eq!( square.label, "square");
    assert_eq!( square.footprints().len(), 1);

    // same instance, bit identical geometry
    let square1 = catalog.resolve( RegionKind::Local, "square").unwrap();
    assert!( Arc::ptr_eq( &square, &square1));
    let bits = |r: &Region| r.geometry.outline().iter().map( |p| (p.lon().to_bits(), p.lat().to_bits())).collect::<Vec<_>>();
    assert_eq!( bits(&square), bits(&square1));
}

#[test]
fn test_circle_region () {
    let catalog = catalog();
    let lhasa = catalog.resolve( RegionKind::Local, "lhasa").unwrap();
    assert_eq!( lhasa.label, "Lhasa");
    assert_eq!( lhasa.geometry.outline().len(), CIRCLE_VERTICES);

    let expected = std::f64::consts::PI * 50_000.0 * 50_000.0;
    let a = lhasa.geometry.area_m2();
    println!("lhasa area: {a} m² (disc: {expected})");
    assert!( (a - expected).abs() / expected < 0.02);

    let c = lhasa.geometry.centroid();
    assert!( (c.lon() - 91.13).abs() < 0.01 && (c.lat() - 29.65).abs() < 0.01);
    assert!( lhasa.geometry.contains( &c));
}

#[test]
fn test_invalid_regions () {
    let catalog = catalog();

    assert_config_error( catalog.resolve( RegionKind::Local, "bowtie"), "self-intersecting");
    assert_config_error( catalog.resolve( RegionKind::Local, "projected"), "EPSG:3857");
    assert_config_error( catalog.resolve( RegionKind::Local, "inverted"), "zero area");
    assert_config_error( catalog.resolve( RegionKind::Local, "sampled_local"), "sampling");
    assert_config_error( catalog.resolve( RegionKind::Local, "atlantis"), "unknown");
    assert_config_error( catalog.resolve( RegionKind::Global, "square"), "not a global region");

    let invalid: Vec<&str> = catalog.entries().filter( |(_,_,e)| e.is_err()).map( |(_,n,_)| n).collect();
    assert_eq!( invalid, vec!["bowtie", "projected", "inverted", "sampled_local"]);
}

#[test]
fn test_duplicate_region () {
    let table: RegionTable = config_from_str( r#"RegionTable( regions: [
        ( name: "a", kind: Local, geometry: BBox([0.0, 0.0, 1.0, 1.0]) ),
        ( name: "a", kind: Local, geometry: BBox([1.0, 1.0, 2.0, 2.0]) ),
    ])"#).unwrap();
    assert!( RegionCatalog::from_table( &table).unwrap_err().is_configuration_error());
}

#[test]
fn test_global_sampling () {
    let world = catalog().resolve( RegionKind::Global, "world").unwrap();
    assert!( world.is_sampled());

    let bounds = world.geometry.bounds();
    let footprints = world.footprints();
    assert_eq!( footprints.len(), 10);
    for fp in footprints {
        let b = fp.bounds();
        println!("sample box: {:?}", b.to_wsen());
        assert!( b.west() >= bounds.west() && b.east() <= bounds.east());
        assert!( b.south() >= bounds.south() && b.north() <= bounds.north());
        assert!( (b.width_deg() - 2.0).abs() < 1e-9 && (b.height_deg() - 2.0).abs() < 1e-9);
    }

    // seeded, i.e. a new catalog yields the same boxes
    let world1 = catalog().resolve( RegionKind::Global, "world").unwrap();
    assert_eq!( world.footprints(), world1.footprints());

    let a = world.max_footprint_area_m2();
    assert!( a > 0.0 && a <= 2.0 * 2.0 * 111_200.0 * 111_200.0);
}
