/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
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

//! this module provides support for simple geometries on the WGS84 ellipsoid surface (EPSG:4326 lon/lat degrees).
//! We use the [geo](https://docs.rs/geo/latest/geo/index.html) crate for the underlying algorithms and wrap its types
//! with the new type pattern to add units of measure ([uom](https://docs.rs/uom/latest/uom/)) and value semantics
//! (geodetic degrees, validity checks).

use std::fmt;
use serde::{Serialize,Deserialize,Serializer,Deserializer};
use serde::ser::SerializeStruct;
use thiserror::Error;

use geo::{BoundingRect, Centroid, Contains, Coord, Intersects, Line, LineString, Point, Polygon, Rect};
use geo::algorithm::geodesic_area::GeodesicArea;

use uom::si::area::square_meter;
use uom::si::f64::Area;

/// mean (authalic) earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_007.2;

/// the coordinate reference we support for configured geometries
pub const WGS84_CRS: &str = "EPSG:4326";

/// meters per degree of latitude on the authalic sphere
#[inline] pub fn meters_per_degree()->f64 { EARTH_RADIUS_M * std::f64::consts::PI / 180.0 }

pub type GeoCoord = Coord<f64>;

/// reasons why a configured geometry is not usable
#[derive(Error,Debug,Clone,PartialEq)]
pub enum GeometryError {
    #[error("non-finite coordinate {0}")]
    NonFinite(String),

    #[error("coordinate out of range {0}")]
    OutOfRange(String),

    #[error("not enough distinct vertices ({0})")]
    TooFewVertices(usize),

    #[error("self-intersecting ring")]
    SelfIntersecting,

    #[error("zero area")]
    ZeroArea,

    #[error("unsupported coordinate reference {0}")]
    UnsupportedCrs(String),
}

/* #region GeoPoint ***********************************************************************************************/

/// a wrapper for geo::Point that uses geodetic degrees stored as f64.
/// Note that we do not normalize - values from configs are checked with [`GeoPoint::check`] instead
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct GeoPoint(Point);

impl GeoPoint {
    pub fn from_lon_lat_degrees (lon: f64, lat: f64) -> Self {
        GeoPoint( Point::new( lon, lat))
    }

    pub fn from_point(p:Point) -> Self { GeoPoint(p) }

    #[inline] pub fn lon(&self) -> f64 { self.0.x() }
    #[inline] pub fn lat(&self) -> f64 { self.0.y() }

    pub fn point (&self) -> &Point { &self.0 }
    pub fn coord (&self)->GeoCoord { self.0.0 }

    pub fn check (&self)->Result<(),GeometryError> {
        let (lon,lat) = (self.lon(), self.lat());
        if !lon.is_finite() || !lat.is_finite() {
            Err( GeometryError::NonFinite( self.to_string()))
        } else if lon < -180.0 || lon > 180.0 || lat < -90.0 || lat > 90.0 {
            Err( GeometryError::OutOfRange( self.to_string()))
        } else {
            Ok(())
        }
    }

    /// the point reached from here after `dist_m` meters on initial `bearing_deg` (great circle on the authalic sphere)
    pub fn destination (&self, bearing_deg: f64, dist_m: f64)->GeoPoint {
        let δ = dist_m / EARTH_RADIUS_M;
        let θ = bearing_deg.to_radians();
        let φ1 = self.lat().to_radians();
        let λ1 = self.lon().to_radians();

        let φ2 = (φ1.sin() * δ.cos() + φ1.cos() * δ.sin() * θ.cos()).asin();
        let λ2 = λ1 + (θ.sin() * δ.sin() * φ1.cos()).atan2( δ.cos() - φ1.sin() * φ2.sin());

        GeoPoint::from_lon_lat_degrees( normalize_180( λ2.to_degrees()), φ2.to_degrees())
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.0.x(),self.0.y())
    }
}

impl Serialize for GeoPoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
        let mut state = serializer.serialize_struct("GeoPoint", 2)?;
        state.serialize_field("lon", &self.lon())?;
        state.serialize_field("lat", &self.lat())?;
        state.end()
    }
}

// we accept "lon"/"longitude"/"x" and "lat"/"latitude"/"y" so that we can read data serialized by `geo` types
#[derive(Deserialize)]
#[serde(rename="GeoPoint")]
struct LonLatFields {
    #[serde(alias="longitude", alias="x")] lon: f64,
    #[serde(alias="latitude", alias="y")] lat: f64,
}

impl<'de> Deserialize<'de> for GeoPoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let f = LonLatFields::deserialize(deserializer)?;
        Ok( GeoPoint::from_lon_lat_degrees( f.lon, f.lat))
    }
}

pub fn normalize_180 (deg: f64)->f64 {
    let d = deg % 360.0;
    if d > 180.0 { d - 360.0 } else if d < -180.0 { d + 360.0 } else { d }
}

/* #endregion GeoPoint */

/* #region GeoRect ***********************************************************************************************/

/// a lon/lat aligned rectangle, i.e. its north and south edges follow parallels
#[derive(Debug,Clone,PartialEq)]
pub struct GeoRect(Rect);

impl GeoRect {
    pub fn from_wsen_degrees (west: f64, south: f64, east: f64, north: f64) -> Self {
        GeoRect( Rect::new( Coord{x: west, y: south}, Coord{x: east, y: north}))
    }

    pub fn from_wsen (wsen: &[f64;4]) -> Self {
        GeoRect::from_wsen_degrees( wsen[0], wsen[1], wsen[2], wsen[3])
    }

    pub fn rect (&self)->&Rect { &self.0 }

    #[inline] pub fn west(&self)->f64 { self.0.min().x }
    #[inline] pub fn east(&self)->f64 { self.0.max().x }
    #[inline] pub fn south(&self)->f64 { self.0.min().y }
    #[inline] pub fn north(&self)->f64 { self.0.max().y }

    pub fn width_deg (&self)->f64 { self.east() - self.west() }
    pub fn height_deg (&self)->f64 { self.north() - self.south() }

    pub fn to_wsen (&self)->[f64;4] { [self.west(), self.south(), self.east(), self.north()] }

    pub fn center (&self)->GeoPoint {
        GeoPoint::from_lon_lat_degrees( (self.west() + self.east()) / 2.0, (self.south() + self.north()) / 2.0)
    }

    /// spherical area of the lon/lat cell: R² · Δλ · (sin φn - sin φs).
    /// Unlike the geodesic polygon area this is also correct for regions spanning the full longitude range
    pub fn area (&self) -> Area {
        let dλ = (self.east() - self.west()).to_radians();
        let a = EARTH_RADIUS_M * EARTH_RADIUS_M * dλ * (self.north().to_radians().sin() - self.south().to_radians().sin());
        Area::new::<square_meter>(a.abs())
    }

    pub fn contains (&self, p: &GeoPoint)->bool {
        p.lon() >= self.west() && p.lon() <= self.east() && p.lat() >= self.south() && p.lat() <= self.north()
    }

    pub fn intersects (&self, other: &GeoRect)->bool {
        self.west() <= other.east() && other.west() <= self.east() && self.south() <= other.north() && other.south() <= self.north()
    }

    pub fn to_polygon (&self)->GeoPolygon {
        GeoPolygon( self.0.to_polygon())
    }

    pub fn corners (&self) -> Vec<GeoPoint> {
        vec![ GeoPoint::from_lon_lat_degrees( self.west(), self.south()),
              GeoPoint::from_lon_lat_degrees( self.east(), self.south()),
              GeoPoint::from_lon_lat_degrees( self.east(), self.north()),
              GeoPoint::from_lon_lat_degrees( self.west(), self.north()) ]
    }

    pub fn check (&self)->Result<(),GeometryError> {
        for p in self.corners() { p.check()? }
        if self.width_deg() <= 0.0 || self.height_deg() <= 0.0 {
            return Err(GeometryError::ZeroArea)
        }
        Ok(())
    }
}

impl Serialize for GeoRect {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
        let mut state = serializer.serialize_struct("GeoRect", 4)?;
        state.serialize_field("west", &self.west())?;
        state.serialize_field("south", &self.south())?;
        state.serialize_field("east", &self.east())?;
        state.serialize_field("north", &self.north())?;
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(rename="GeoRect")]
struct WsenFields { west: f64, south: f64, east: f64, north: f64 }

impl<'de> Deserialize<'de> for GeoRect {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let f = WsenFields::deserialize(deserializer)?;
        Ok( GeoRect::from_wsen_degrees( f.west, f.south, f.east, f.north))
    }
}

/* #endregion GeoRect */

/* #region GeoPolygon **********************************************************************************************/

/// a simple polygon without holes
#[derive(Debug,Clone,PartialEq)]
pub struct GeoPolygon(Polygon);

impl GeoPolygon {
    /// the exterior ring is closed automatically if first and last point differ
    pub fn from_exterior_geo_points (external: Vec<GeoPoint>) -> Self {
        let ext_coords: Vec<GeoCoord> = external.iter().map(|p| p.coord()).collect();
        GeoPolygon( Polygon::new( LineString::new( ext_coords), Vec::with_capacity(0)))
    }

    /// regular n-gon approximating a geodesic circle with given center and radius
    pub fn circle (center: GeoPoint, radius_m: f64, n_vertices: usize) -> Self {
        let n = n_vertices.max(8);
        let step = 360.0 / n as f64;
        // counter clockwise
        let pts: Vec<GeoPoint> = (0..n).map( |i| center.destination( 360.0 - (i as f64 * step), radius_m)).collect();
        GeoPolygon::from_exterior_geo_points( pts)
    }

    pub fn polygon (&self)->&Polygon { &self.0 }

    /// exterior ring points, without the closing point
    pub fn exterior_points (&self)->Vec<GeoPoint> {
        let mut pts: Vec<GeoPoint> = self.0.exterior().points().map(GeoPoint::from_point).collect();
        if pts.len() > 1 && pts.first() == pts.last() { pts.pop(); }
        pts
    }

    pub fn area (&self)->Area {
        Area::new::<square_meter>( self.0.geodesic_area_unsigned())
    }

    pub fn bounds (&self)->Option<GeoRect> {
        self.0.bounding_rect().map( GeoRect)
    }

    pub fn centroid (&self)->Option<GeoPoint> {
        self.0.centroid().map( GeoPoint)
    }

    pub fn contains (&self, p: &GeoPoint)->bool { self.0.contains( &p.0) }

    /// check that all vertices are finite and in range, that we have at least 3 distinct vertices,
    /// no two non-adjacent edges intersect, and the enclosed area is not zero
    pub fn check (&self)->Result<(),GeometryError> {
        let mut pts = self.exterior_points();
        for p in &pts { p.check()? }

        pts.dedup();
        if pts.len() > 1 && pts.first() == pts.last() { pts.pop(); }
        if pts.len() < 3 {
            return Err( GeometryError::TooFewVertices(pts.len()))
        }

        if is_self_intersecting( &pts) {
            return Err( GeometryError::SelfIntersecting)
        }

        let a = self.0.geodesic_area_unsigned();
        if !a.is_finite() || a < 1.0 {
            return Err( GeometryError::ZeroArea)
        }

        Ok(())
    }
}

/// check ring edges (implicitly closed) for intersections between non-adjacent edges
fn is_self_intersecting (pts: &[GeoPoint])->bool {
    let n = pts.len();
    let edges: Vec<Line> = (0..n).map( |i| Line::new( pts[i].coord(), pts[(i+1) % n].coord())).collect();

    for i in 0..n {
        for j in (i+2)..n {
            if i == 0 && j == n-1 { continue } // closing edge is adjacent to the first one
            if edges[i].intersects( &edges[j]) { return true }
        }
    }
    false
}

impl Serialize for GeoPolygon {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
        let mut state = serializer.serialize_struct("GeoPolygon", 1)?;
        state.serialize_field("exterior", &self.exterior_points())?;
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(rename="GeoPolygon")]
struct PolygonFields { exterior: Vec<GeoPoint> }

impl<'de> Deserialize<'de> for GeoPolygon {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let f = PolygonFields::deserialize(deserializer)?;
        Ok( GeoPolygon::from_exterior_geo_points( f.exterior))
    }
}

/* #endregion GeoPolygon */
