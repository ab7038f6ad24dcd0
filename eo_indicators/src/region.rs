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

//! named regions of interest and the catalog we resolve them from

use std::{collections::HashMap, path::Path, sync::Arc};
use serde::{Deserialize,Serialize};
use strum::{Display,EnumString};
use uom::si::{f64::Area, area::square_meter};
use tracing::warn;

use eo_common::{
    config::load_config_path,
    geo::{GeoPoint, GeoPolygon, GeoRect, GeometryError, WGS84_CRS},
};
use crate::errors::{configuration_error, Result};
use crate::sampling::{sample_boxes, GlobalSampling};

/// number of vertices we use to approximate circular regions
pub const CIRCLE_VERTICES: usize = 64;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Serialize,Deserialize,Display,EnumString)]
#[strum(serialize_all="snake_case", ascii_case_insensitive)]
pub enum RegionKind {
    Global,
    Local,
}

/// how a region geometry is written in region tables
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub enum GeometryConfig {
    /// [west, south, east, north] in degrees
    BBox(Vec<f64>),
    /// exterior ring, closed implicitly
    Polygon(Vec<GeoPoint>),
    /// radius in meters
    Circle { center: GeoPoint, radius: f64 },
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct RegionConfig {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub kind: RegionKind,
    pub geometry: GeometryConfig,
    /// only geographic WGS84 is supported
    #[serde(default)]
    pub crs: Option<String>,
    #[serde(default)]
    pub sampling: Option<GlobalSampling>,
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct RegionTable {
    pub regions: Vec<RegionConfig>
}

/// validated region geometry
#[derive(Debug,Clone,PartialEq,Serialize)]
pub enum RegionGeometry {
    Rect(GeoRect),
    Polygon(GeoPolygon),
}

impl RegionGeometry {
    pub fn from_config (cfg: &GeometryConfig)->std::result::Result<Self,GeometryError> {
        match cfg {
            GeometryConfig::BBox(wsen) => {
                if wsen.len() != 4 {
                    return Err( GeometryError::OutOfRange( format!("bbox needs 4 values, got {}", wsen.len())))
                }
                // check before constructing since Rect normalizes corners
                if !(wsen[0] < wsen[2] && wsen[1] < wsen[3]) {
                    return Err( GeometryError::ZeroArea)
                }
                let rect = GeoRect::from_wsen_degrees( wsen[0], wsen[1], wsen[2], wsen[3]);
                rect.check()?;
                Ok( RegionGeometry::Rect(rect))
            }
            GeometryConfig::Polygon(pts) => {
                let poly = GeoPolygon::from_exterior_geo_points( pts.clone());
                poly.check()?;
                Ok( RegionGeometry::Polygon(poly))
            }
            GeometryConfig::Circle { center, radius } => {
                center.check()?;
                if !(radius.is_finite() && *radius > 0.0) {
                    return Err( GeometryError::ZeroArea)
                }
                let poly = GeoPolygon::circle( *center, *radius, CIRCLE_VERTICES);
                poly.check()?;
                Ok( RegionGeometry::Polygon(poly))
            }
        }
    }

    pub fn area (&self)->Area {
        match self {
            RegionGeometry::Rect(r) => r.area(),
            RegionGeometry::Polygon(p) => p.area(),
        }
    }

    pub fn area_m2 (&self)->f64 { self.area().get::<square_meter>() }

    pub fn bounds (&self)->GeoRect {
        match self {
            RegionGeometry::Rect(r) => r.clone(),
            // validated polygons always have bounds
            RegionGeometry::Polygon(p) => p.bounds().unwrap_or_else( || GeoRect::from_wsen_degrees( 0.0, 0.0, 0.0, 0.0)),
        }
    }

    pub fn centroid (&self)->GeoPoint {
        match self {
            RegionGeometry::Rect(r) => r.center(),
            RegionGeometry::Polygon(p) => p.centroid().unwrap_or_else( || self.bounds().center()),
        }
    }

    pub fn contains (&self, p: &GeoPoint)->bool {
        match self {
            RegionGeometry::Rect(r) => r.contains(p),
            RegionGeometry::Polygon(poly) => poly.contains(p),
        }
    }

    /// the closed-form outline we use for map overlays (without the closing point)
    pub fn outline (&self)->Vec<GeoPoint> {
        match self {
            RegionGeometry::Rect(r) => r.corners(),
            RegionGeometry::Polygon(p) => p.exterior_points(),
        }
    }
}

/// a resolved, immutable region
#[derive(Debug,Clone,Serialize)]
pub struct Region {
    pub name: String,
    pub label: String,
    pub kind: RegionKind,
    pub geometry: RegionGeometry,

    #[serde(skip_serializing_if="eo_common::is_none")]
    pub sampling: Option<GlobalSampling>,

    /// the geometries that are actually reduced: sample boxes if we have sampling, the region geometry otherwise
    #[serde(skip)]
    footprints: Vec<RegionGeometry>,
}

impl Region {
    pub fn try_from_config (cfg: &RegionConfig)->std::result::Result<Region,String> {
        if let Some(crs) = &cfg.crs {
            if crs != WGS84_CRS {
                return Err( GeometryError::UnsupportedCrs( crs.clone()).to_string())
            }
        }
        let geometry = RegionGeometry::from_config( &cfg.geometry).map_err( |e| e.to_string())?;

        let footprints = match &cfg.sampling {
            Some(sampling) => {
                if cfg.kind != RegionKind::Global {
                    return Err( "sampling is only supported for global regions".into())
                }
                let bounds = geometry.bounds();
                sampling.check( &bounds)?;
                sample_boxes( &bounds, sampling).into_iter().map( RegionGeometry::Rect).collect()
            }
            None => vec![ geometry.clone() ]
        };

        Ok( Region {
            name: cfg.name.clone(),
            label: cfg.label.clone().unwrap_or_else( || cfg.name.clone()),
            kind: cfg.kind,
            geometry,
            sampling: cfg.sampling.clone(),
            footprints
        })
    }

    pub fn footprints (&self)->&[RegionGeometry] { &self.footprints }

    pub fn is_sampled (&self)->bool { self.sampling.is_some() }

    /// the largest area we have to reduce in a single provider request
    pub fn max_footprint_area_m2 (&self)->f64 {
        self.footprints.iter().map( |g| g.area_m2()).fold( 0.0, f64::max)
    }
}

/// all regions from a region table, including the ones that did not validate (with the reason why)
#[derive(Debug,Default)]
pub struct RegionCatalog {
    regions: HashMap<(RegionKind,String), std::result::Result<Arc<Region>,String>>,
    order: Vec<(RegionKind,String)>,
}

impl RegionCatalog {
    pub fn from_table (table: &RegionTable)->Result<Self> {
        let mut catalog = RegionCatalog::default();

        for cfg in &table.regions {
            let key = (cfg.kind, cfg.name.clone());
            if catalog.regions.contains_key( &key) {
                return Err( configuration_error( format!("duplicate {} region '{}'", cfg.kind, cfg.name)))
            }

            let entry = Region::try_from_config( cfg).map( Arc::new);
            if let Err(reason) = &entry {
                warn!("invalid {} region '{}': {}", cfg.kind, cfg.name, reason);
            }
            catalog.order.push( key.clone());
            catalog.regions.insert( key, entry);
        }

        Ok(catalog)
    }

    pub fn load (path: impl AsRef<Path>)->Result<Self> {
        let table: RegionTable = load_config_path( path)?;
        Self::from_table( &table)
    }

    /// the validated region for given kind and name. Resolving the same name always yields the same instance
    pub fn resolve (&self, kind: RegionKind, name: &str)->Result<Arc<Region>> {
        match self.regions.get( &(kind, name.to_string())) {
            Some(Ok(region)) => Ok( region.clone()),
            Some(Err(reason)) => Err( configuration_error( format!("{kind} region '{name}' is invalid: {reason}"))),
            None => {
                if self.order.iter().any( |(_,n)| n == name) {
                    Err( configuration_error( format!("region '{name}' is not a {kind} region")))
                } else {
                    Err( configuration_error( format!("unknown {kind} region '{name}'")))
                }
            }
        }
    }

    /// entries in table order
    pub fn entries (&self)->impl Iterator<Item=(RegionKind, &str, std::result::Result<&Arc<Region>,&String>)> {
        self.order.iter().filter_map( |key| {
            self.regions.get(key).map( |e| (key.0, key.1.as_str(), e.as_ref()))
        })
    }

    pub fn len (&self)->usize { self.order.len() }

    pub fn is_empty (&self)->bool { self.order.is_empty() }
}
