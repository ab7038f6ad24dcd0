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

use std::fmt;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize,Serialize};

use eo_common::datetime::{add_days, add_months, is_first_of_year, month_day_in_year, parse_month_day};
use crate::errors::{configuration_error, Result};

/// half open date interval [start,end)
#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    pub fn new (start: NaiveDate, end: NaiveDate)->Result<Self> {
        if start < end {
            Ok( TimeWindow { start, end })
        } else {
            Err( configuration_error( format!("empty time window {start} .. {end}")))
        }
    }

    pub fn contains (&self, d: &NaiveDate)->bool { *d >= self.start && *d < self.end }

    pub fn intersects (&self, other: &TimeWindow)->bool { self.start < other.end && other.start < self.end }

    pub fn num_days (&self)->i64 { (self.end - self.start).num_days() }

    /// the overlap of both windows, None if they do not intersect
    pub fn intersection (&self, other: &TimeWindow)->Option<TimeWindow> {
        let start = self.start.max( other.start);
        let end = self.end.min( other.end);
        if start < end { Some( TimeWindow { start, end }) } else { None }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt (&self, f: &mut fmt::Formatter<'_>)->fmt::Result {
        write!( f, "[{} .. {})", self.start, self.end)
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum PeriodGranularity {
    Yearly,
    Monthly,
    Days(u32),
}

impl PeriodGranularity {
    fn next (&self, d: NaiveDate)->Option<NaiveDate> {
        match self {
            PeriodGranularity::Yearly => add_months( d, 12),
            PeriodGranularity::Monthly => add_months( d, 1),
            PeriodGranularity::Days(n) => add_days( d, *n),
        }
    }

    fn label (&self, d: &NaiveDate)->String {
        match self {
            PeriodGranularity::Yearly if is_first_of_year(d) => d.format("%Y").to_string(),
            PeriodGranularity::Monthly if d.day() == 1 => d.format("%Y-%m").to_string(),
            _ => d.format("%Y-%m-%d").to_string()
        }
    }
}

/// a MM-DD .. MM-DD window that is sampled within each yearly period. If `end` is not after
/// `start` the window wraps into the following year. Both ends are month-day strings, `end` is exclusive
#[derive(Debug,Clone,PartialEq,Eq,Serialize,Deserialize)]
pub struct Season {
    pub start: String,
    pub end: String,
}

impl Season {
    pub fn new (start: impl ToString, end: impl ToString)->Result<Self> {
        let season = Season { start: start.to_string(), end: end.to_string() };
        season.check()?;
        Ok(season)
    }

    pub fn check (&self)->Result<()> {
        let (sm,sd) = parse_month_day( &self.start).ok_or_else( || configuration_error( format!("invalid season start '{}'", self.start)))?;
        let (em,ed) = parse_month_day( &self.end).ok_or_else( || configuration_error( format!("invalid season end '{}'", self.end)))?;
        if (sm,sd) == (em,ed) {
            return Err( configuration_error( format!("empty season {} .. {}", self.start, self.end)))
        }
        Ok(())
    }

    pub fn wraps_year (&self)->bool {
        match (parse_month_day(&self.start), parse_month_day(&self.end)) {
            (Some(s), Some(e)) => e <= s,
            _ => false
        }
    }

    /// the season window starting in `year`
    pub fn window_in (&self, year: i32)->Result<TimeWindow> {
        let (sm,sd) = parse_month_day( &self.start).ok_or_else( || configuration_error( format!("invalid season start '{}'", self.start)))?;
        let (em,ed) = parse_month_day( &self.end).ok_or_else( || configuration_error( format!("invalid season end '{}'", self.end)))?;
        let end_year = if (em,ed) <= (sm,sd) { year + 1 } else { year };

        let start = month_day_in_year( year, sm, sd).ok_or_else( || configuration_error( format!("no season start in {year}")))?;
        let end = month_day_in_year( end_year, em, ed).ok_or_else( || configuration_error( format!("no season end in {end_year}")))?;
        TimeWindow::new( start, end)
    }
}

/// one element of a time partition
#[derive(Debug,Clone,PartialEq,Eq,Serialize,Deserialize)]
pub struct Period {
    pub label: String,

    /// the partition interval
    pub bounds: TimeWindow,

    /// the interval that is actually sampled. Same as `bounds` unless we have a season, in which case
    /// it is the season window clipped to the partitioned range. None if the season does not fall into it
    pub window: Option<TimeWindow>,
}

/// split [start,end) into contiguous, strictly increasing periods. The last period is truncated at `end`.
/// Seasons are only supported for yearly partitions. A wrapping season window can extend past its period
/// bounds but never past [start,end)
pub fn partition (start: NaiveDate, end: NaiveDate, granularity: PeriodGranularity, season: Option<&Season>)->Result<Vec<Period>> {
    if start >= end {
        return Err( configuration_error( format!("empty period range {start} .. {end}")))
    }
    if let PeriodGranularity::Days(0) = granularity {
        return Err( configuration_error( "zero day period granularity"))
    }
    if let Some(season) = season {
        if granularity != PeriodGranularity::Yearly {
            return Err( configuration_error( "seasons require yearly granularity"))
        }
        season.check()?;
    }

    let range = TimeWindow::new( start, end)?;
    let mut periods = Vec::new();
    let mut cur = start;

    while cur < end {
        let next = granularity.next( cur).ok_or_else( || configuration_error( format!("period after {cur} out of range")))?;
        let bounds = TimeWindow { start: cur, end: next.min(end) };
        let window = match season {
            Some(season) => season.window_in( cur.year())?.intersection( &range),
            None => Some(bounds)
        };
        periods.push( Period { label: granularity.label(&cur), bounds, window });
        cur = next;
    }

    Ok(periods)
}
