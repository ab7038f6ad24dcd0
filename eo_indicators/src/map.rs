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

//! renderer independent map layer specifications

use std::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display,EnumIter,EnumString,IntoStaticStr};

use eo_common::geo::{GeoPoint, GeoRect};
use crate::dataset::VisParams;
use crate::reducer::{Raster, SampleValue};
use crate::region::Region;

pub const MIN_ZOOM: u8 = 2;
pub const MAX_ZOOM: u8 = 18;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Display,EnumString,EnumIter,IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum Basemap {
    #[strum(serialize="OpenStreetMap")]
    OpenStreetMap,
    #[strum(serialize="CartoDB Positron")]
    CartoDbPositron,
    #[strum(serialize="CartoDB Dark Matter")]
    CartoDbDarkMatter,
    #[strum(serialize="Stamen Terrain")]
    StamenTerrain,
    #[strum(serialize="Stamen Toner")]
    StamenToner,
}

impl Basemap {
    pub fn tile_url (&self)->&'static str {
        match self {
            Basemap::OpenStreetMap => "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
            Basemap::CartoDbPositron => "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png",
            Basemap::CartoDbDarkMatter => "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png",
            Basemap::StamenTerrain => "https://tiles.stadiamaps.com/tiles/stamen_terrain/{z}/{x}/{y}{r}.png",
            Basemap::StamenToner => "https://tiles.stadiamaps.com/tiles/stamen_toner/{z}/{x}/{y}{r}.png",
        }
    }

    pub fn attribution (&self)->&'static str {
        match self {
            Basemap::OpenStreetMap => "© OpenStreetMap contributors",
            Basemap::CartoDbPositron | Basemap::CartoDbDarkMatter => "© OpenStreetMap contributors © CARTO",
            Basemap::StamenTerrain | Basemap::StamenToner => "© Stadia Maps © Stamen Design © OpenStreetMap contributors",
        }
    }
}

// basemap names contain spaces so we (de)serialize through the display names, which also works for RON
impl Serialize for Basemap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
        let name: &'static str = (*self).into();
        serializer.serialize_str( name)
    }
}

impl<'de> Deserialize<'de> for Basemap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        Basemap::from_str( &s).map_err( |_| serde::de::Error::custom( format!("unknown basemap style '{s}'")))
    }
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct ColorRamp {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<String>,
}

impl ColorRamp {
    /// palette entry for a value, clamped to the ramp range
    pub fn color_for (&self, v: f64)->Option<&str> {
        if self.palette.is_empty() || !v.is_finite() { return None }
        let t = if self.max > self.min { ((v - self.min) / (self.max - self.min)).clamp( 0.0, 1.0) } else { 0.0 };
        let idx = ((t * self.palette.len() as f64) as usize).min( self.palette.len() - 1);
        self.palette.get(idx).map( |c| c.as_str())
    }
}

impl From<&VisParams> for ColorRamp {
    fn from (vis: &VisParams)->Self {
        ColorRamp { min: vis.min, max: vis.max, palette: vis.palette.clone() }
    }
}

/// what we want to show on top of the basemap
pub enum MapLayer<'a> {
    Raster(&'a Raster),
    Scalar(Option<f64>),
    Samples(&'a [SampleValue]),
}

#[derive(Debug,Clone,PartialEq,Serialize)]
pub struct Marker {
    pub position: GeoPoint,
    pub value: Option<f64>,
    #[serde(skip_serializing_if="eo_common::is_none")]
    pub color: Option<String>,
}

#[derive(Debug,Clone,PartialEq,Serialize)]
#[serde(tag="type")]
pub enum Overlay {
    Raster { bounds: GeoRect, width: usize, height: usize, values: Vec<Option<f64>>, opacity: f64 },
    Scalar { position: GeoPoint, value: Option<f64>, color: Option<String> },
    Markers { markers: Vec<Marker> },
}

/// presentation attributes of a layer
#[derive(Debug,Clone)]
pub struct LayerStyle {
    pub title: String,
    pub unit: String,
    pub ramp: ColorRamp,
    pub opacity: f64,
}

#[derive(Debug,Clone,Serialize)]
pub struct MapLayerSpec {
    pub title: String,
    pub unit: String,
    pub center: GeoPoint,
    pub zoom: u8,
    pub bounds: GeoRect,
    pub basemap: Basemap,
    pub tile_url: String,
    pub attribution: String,
    pub region_outline: Vec<GeoPoint>,
    pub ramp: ColorRamp,
    pub overlay: Overlay,
}

/// floor(log2(360/extent)) + 1, clamped to [MIN_ZOOM,MAX_ZOOM]
pub fn zoom_for_extent (extent_deg: f64)->u8 {
    if !(extent_deg.is_finite() && extent_deg > 0.0) { return MAX_ZOOM }
    let z = (360.0 / extent_deg).log2().floor() + 1.0;
    z.clamp( MIN_ZOOM as f64, MAX_ZOOM as f64) as u8
}

pub struct MapComposer;

impl MapComposer {
    /// this is a pure function of its inputs, composing does not render or fetch anything
    pub fn compose (layer: MapLayer<'_>, region: &Region, basemap: Basemap, style: &LayerStyle)->MapLayerSpec {
        let bounds = region.geometry.bounds();
        let center = region.geometry.centroid();
        let zoom = zoom_for_extent( bounds.width_deg().max( bounds.height_deg()));

        let overlay = match layer {
            MapLayer::Raster(raster) => Overlay::Raster {
                bounds: raster.bounds.clone(),
                width: raster.width,
                height: raster.height,
                values: raster.values.clone(),
                opacity: style.opacity
            },
            MapLayer::Scalar(value) => Overlay::Scalar {
                position: center,
                value,
                color: value.and_then( |v| style.ramp.color_for(v)).map( String::from)
            },
            MapLayer::Samples(samples) => Overlay::Markers {
                markers: samples.iter().map( |s| Marker {
                    position: s.center,
                    value: s.value,
                    color: s.value.and_then( |v| style.ramp.color_for(v)).map( String::from)
                }).collect()
            }
        };

        MapLayerSpec {
            title: style.title.clone(),
            unit: style.unit.clone(),
            center,
            zoom,
            bounds,
            basemap,
            tile_url: basemap.tile_url().to_string(),
            attribution: basemap.attribution().to_string(),
            region_outline: region.geometry.outline(),
            ramp: style.ramp.clone(),
            overlay
        }
    }
}
