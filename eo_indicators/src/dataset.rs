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

//! static descriptors of the indicator datasets we know how to reduce

use std::{collections::BTreeMap, str::FromStr, sync::Arc};
use chrono::NaiveDate;
use serde::{Deserialize,Serialize};
use strum::{Display,EnumIter,EnumString,IntoEnumIterator,IntoStaticStr};

use crate::errors::{configuration_error, Result};
use crate::period::TimeWindow;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,PartialOrd,Ord,Serialize,Deserialize,Display,EnumString,EnumIter,IntoStaticStr)]
#[strum(serialize_all="snake_case", ascii_case_insensitive)]
#[serde(rename_all="snake_case")]
pub enum DatasetKey {
    Ch4,
    Snow,
    Lst,
    Sst,
}

/// inclusive range of physically plausible values. Pixels outside are treated as invalid
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new (min: f64, max: f64)->Self { ValueRange { min, max } }

    pub fn contains (&self, v: f64)->bool { v.is_finite() && v >= self.min && v <= self.max }
}

/// display hints used to build map color ramps
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<String>,
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct DatasetDescriptor {
    pub key: DatasetKey,
    pub title: String,

    /// archive collection and band identifiers
    pub collection_id: String,
    pub band: String,

    /// native ground sampling distance in m/px
    pub native_resolution: f64,

    /// coarsest resolution (m/px) we still accept when coarsening to stay within a pixel budget
    pub max_resolution: f64,

    /// physical values outside of this range are masked
    pub valid_range: ValueRange,

    /// factor to convert raw archive values into physical units
    pub scale: f64,
    pub unit: String,

    /// first day with data
    pub coverage_start: NaiveDate,
    /// end of coverage (exclusive), None if still ongoing
    #[serde(skip_serializing_if="eo_common::is_none", default)]
    pub coverage_end: Option<NaiveDate>,

    /// name of the threshold in the [`ThresholdPolicy`] used for counting classifiers
    #[serde(skip_serializing_if="eo_common::is_none", default)]
    pub threshold_key: Option<String>,

    pub vis: VisParams,
}

impl DatasetDescriptor {
    pub fn check (&self)->Result<()> {
        if !(self.valid_range.min < self.valid_range.max) {
            return Err( configuration_error( format!("dataset {} has empty valid range [{},{}]", self.key, self.valid_range.min, self.valid_range.max)))
        }
        if !(self.native_resolution.is_finite() && self.native_resolution > 0.0) {
            return Err( configuration_error( format!("dataset {} has invalid native resolution {}", self.key, self.native_resolution)))
        }
        if !(self.max_resolution.is_finite() && self.max_resolution >= self.native_resolution) {
            return Err( configuration_error( format!("dataset {} max resolution {} below native resolution", self.key, self.max_resolution)))
        }
        if !(self.scale.is_finite() && self.scale != 0.0) {
            return Err( configuration_error( format!("dataset {} has invalid scale {}", self.key, self.scale)))
        }
        if let Some(end) = self.coverage_end {
            if end <= self.coverage_start {
                return Err( configuration_error( format!("dataset {} has empty temporal coverage", self.key)))
            }
        }
        Ok(())
    }

    /// does the temporal coverage of this dataset overlap with the given window
    pub fn covers (&self, window: &TimeWindow)->bool {
        window.end > self.coverage_start && self.coverage_end.map( |end| window.start < end).unwrap_or(true)
    }

    /// raw archive value to physical value, None if the result is outside the valid range
    pub fn physical_value (&self, raw: f64)->Option<f64> {
        let v = raw * self.scale;
        if self.valid_range.contains(v) { Some(v) } else { None }
    }
}

fn date (y: i32, m: u32, d: u32)->NaiveDate {
    NaiveDate::from_ymd_opt( y, m, d).unwrap_or_default()
}

fn palette (colors: &[&str])->Vec<String> {
    colors.iter().map( |c| c.to_string()).collect()
}

pub fn builtin_descriptor (key: DatasetKey)->DatasetDescriptor {
    match key {
        DatasetKey::Ch4 => DatasetDescriptor {
            key,
            title: "Sentinel-5P TROPOMI CH4 column volume mixing ratio".into(),
            collection_id: "COPERNICUS/S5P/OFFL/L3_CH4".into(),
            band: "CH4_column_volume_mixing_ratio_dry_air".into(),
            native_resolution: 1113.2,
            max_resolution: 1113.2 * 256.0,
            valid_range: ValueRange::new( 1500.0, 2500.0),
            scale: 1.0,
            unit: "ppb".into(),
            coverage_start: date( 2019, 2, 8),
            coverage_end: None,
            threshold_key: Some("ch4_ppb".into()),
            vis: VisParams { min: 1750.0, max: 1900.0, palette: palette( &["blue", "cyan", "yellow", "red"]) },
        },
        DatasetKey::Snow => DatasetDescriptor {
            key,
            title: "MODIS Terra daily NDSI snow cover".into(),
            collection_id: "MODIS/061/MOD10A1".into(),
            band: "NDSI_Snow_Cover".into(),
            native_resolution: 500.0,
            max_resolution: 500.0 * 512.0,
            valid_range: ValueRange::new( 0.0, 100.0),
            scale: 1.0,
            unit: "NDSI".into(),
            coverage_start: date( 2000, 2, 24),
            coverage_end: None,
            threshold_key: Some("ndsi".into()),
            vis: VisParams { min: 0.0, max: 100.0, palette: palette( &["black", "blue", "cyan", "white"]) },
        },
        DatasetKey::Lst => DatasetDescriptor {
            key,
            title: "MODIS Terra 8-day land surface temperature (day)".into(),
            collection_id: "MODIS/061/MOD11A2".into(),
            band: "LST_Day_1km".into(),
            native_resolution: 1000.0,
            max_resolution: 1000.0 * 256.0,
            valid_range: ValueRange::new( 150.0, 350.0),
            scale: 0.02,
            unit: "K".into(),
            coverage_start: date( 2000, 2, 18),
            coverage_end: None,
            threshold_key: Some("lst_k".into()),
            vis: VisParams { min: 250.0, max: 330.0, palette: palette( &["#040274", "#3be285", "#ffd300", "#ff0000"]) },
        },
        DatasetKey::Sst => DatasetDescriptor {
            key,
            title: "NOAA OISST v2.1 daily sea surface temperature".into(),
            collection_id: "NOAA/CDR/OISST/V2_1".into(),
            band: "sst".into(),
            native_resolution: 27_830.0,
            max_resolution: 27_830.0 * 16.0,
            valid_range: ValueRange::new( -3.0, 45.0),
            scale: 0.01,
            unit: "°C".into(),
            coverage_start: date( 1981, 9, 1),
            coverage_end: None,
            threshold_key: Some("sst_c".into()),
            vis: VisParams { min: -2.0, max: 32.0, palette: palette( &["#000080", "#00ffff", "#ffff00", "#ff0000"]) },
        },
    }
}

/// the set of datasets that can be referenced by key. Descriptors are immutable once registered
#[derive(Debug,Clone)]
pub struct DatasetRegistry {
    descriptors: BTreeMap<DatasetKey,Arc<DatasetDescriptor>>
}

impl DatasetRegistry {
    pub fn empty()->Self { DatasetRegistry { descriptors: BTreeMap::new() } }

    pub fn builtin()->Self {
        let descriptors = DatasetKey::iter().map( |k| (k, Arc::new( builtin_descriptor(k)))).collect();
        DatasetRegistry { descriptors }
    }

    /// add or replace a descriptor, which has to pass its consistency check
    pub fn with_descriptor (mut self, descriptor: DatasetDescriptor)->Result<Self> {
        descriptor.check()?;
        self.descriptors.insert( descriptor.key, Arc::new(descriptor));
        Ok(self)
    }

    pub fn get (&self, key: DatasetKey)->Result<Arc<DatasetDescriptor>> {
        self.descriptors.get(&key).cloned()
            .ok_or_else( || configuration_error( format!("dataset '{key}' is not registered")))
    }

    /// look up a descriptor by its (case insensitive) key name
    pub fn describe (&self, key: &str)->Result<Arc<DatasetDescriptor>> {
        let dk = DatasetKey::from_str( key.trim())
            .map_err( |_| configuration_error( format!("unknown dataset '{key}' (known: {})", self.known_keys().join(", "))))?;
        self.get( dk)
    }

    pub fn known_keys (&self)->Vec<&'static str> {
        self.descriptors.keys().map( |k| (*k).into()).collect()
    }

    pub fn iter (&self)->impl Iterator<Item=&Arc<DatasetDescriptor>> {
        self.descriptors.values()
    }
}

impl Default for DatasetRegistry {
    fn default()->Self { DatasetRegistry::builtin() }
}

/// named thresholds (in physical units of the respective dataset) used by counting reducers
#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
#[serde(transparent)]
pub struct ThresholdPolicy {
    thresholds: BTreeMap<String,f64>
}

impl ThresholdPolicy {
    pub fn new()->Self { ThresholdPolicy::default() }

    pub fn with (mut self, name: impl ToString, value: f64)->Self {
        self.thresholds.insert( name.to_string(), value);
        self
    }

    pub fn get (&self, name: &str)->Option<f64> { self.thresholds.get(name).copied() }

    pub fn threshold_for (&self, descriptor: &DatasetDescriptor)->Option<f64> {
        descriptor.threshold_key.as_ref().and_then( |k| self.get(k))
    }

    pub fn is_empty (&self)->bool { self.thresholds.is_empty() }
}
