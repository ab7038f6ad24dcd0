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

use chrono::{DateTime, Datelike, Days, Local, Months, NaiveDate, Utc};
use serde::{Deserialize,Serializer,Deserializer};
use std::time::Duration;
use parse_duration::parse;

// simple Duration ctors that do not require nightly features
#[inline] pub fn millis (n: u64)->Duration { Duration::from_millis(n) }
#[inline] pub fn secs (n: u64)->Duration { Duration::from_secs(n) }
#[inline] pub fn minutes (n: u64)->Duration { Duration::from_secs(n * 60) }

#[inline]
pub fn utc_now()->DateTime<Utc> {
    Utc::now()
}

#[inline]
pub fn local_now()->DateTime<Local> {
    Local::now()
}

/// timestamp suitable to be used in filenames (e.g. "20240317_142233")
pub fn filename_timestamp (dt: &DateTime<Local>) -> String {
    format!("{}", dt.format("%Y%m%d_%H%M%S"))
}

//--- calendar arithmetic (saturating to None on overflow)

pub fn add_months (nd: NaiveDate, n: u32)->Option<NaiveDate> {
    nd.checked_add_months( Months::new(n))
}

pub fn add_days (nd: NaiveDate, n: u32)->Option<NaiveDate> {
    nd.checked_add_days( Days::new(n as u64))
}

/// parse "YYYY-MM-DD"
pub fn parse_naive_date (s: &str)->Option<NaiveDate> {
    NaiveDate::parse_from_str( s.trim(), "%Y-%m-%d").ok()
}

/// parse "MM-DD". Feb 29 is accepted, see [`month_day_in_year`] for non-leap years
pub fn parse_month_day (s: &str)->Option<(u32,u32)> {
    let mut it = s.trim().split('-');
    let month: u32 = it.next()?.parse().ok()?;
    let day: u32 = it.next()?.parse().ok()?;
    if it.next().is_some() { return None }

    // check against a leap year so that 02-29 is valid
    NaiveDate::from_ymd_opt( 2000, month, day).map(|_| (month,day))
}

/// the date for a month/day in a given year, Feb 29 falls back to Feb 28 in non-leap years
pub fn month_day_in_year (year: i32, month: u32, day: u32)->Option<NaiveDate> {
    NaiveDate::from_ymd_opt( year, month, day).or_else( || {
        if month == 2 && day == 29 { NaiveDate::from_ymd_opt( year, 2, 28) } else { None }
    })
}

pub fn is_first_of_year (nd: &NaiveDate)->bool {
    nd.month() == 1 && nd.day() == 1
}

//--- support for serde

pub fn deserialize_duration <'a,D>(deserializer: D) -> Result<Duration,D::Error>
    where D: Deserializer<'a>
{
    String::deserialize(deserializer).and_then( |string| {
        parse(string.as_str())
            .map_err( |e| serde::de::Error::custom(format!("{:?}",e)))
    })
}

pub fn deserialize_optional_duration <'a,D>(deserializer: D) -> Result<Option<Duration>,D::Error>
    where D: Deserializer<'a>
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    if let Some(s) = s {
        let d =  parse(s.as_str()).map_err( |e| serde::de::Error::custom(format!("{:?}",e)))?;
        return Ok( Some(d) )
    }

    Ok(None)
}

pub fn serialize_duration<S: Serializer> (dur: &Duration, s: S) -> Result<S::Ok, S::Error>  {
    let dfm = format!("{:?}", dur);
    s.serialize_str(&dfm)
}

pub fn serialize_optional_duration<S>(dur: &Option<Duration>, s: S) -> Result<S::Ok, S::Error>
    where S: Serializer,
{
    if let Some(d) = dur {
        let dfm = format!("{:?}", d);
        return s.serialize_str(&dfm);
    }
    s.serialize_none()
}
