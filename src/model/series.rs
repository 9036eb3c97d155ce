// src/model/series.rs

//! Daily demand series construction.
//!
//! Turns the raw consumption log into one gap-free daily series per pair:
//! rows are filtered to the pair, dates parsed (bad dates are skipped, not
//! fatal), same-day quantities summed, missing calendar days filled with 0
//! and negative totals clipped to 0.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{debug, warn};

use crate::model::record::{ConsumptionRecord, PairKey};

/// Date layouts accepted for the `tanggal` column, tried in order.
/// Month-first comes before day-first so `01/02/2024` reads as January 2nd.
const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y%m%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DemandPoint {
    pub date: NaiveDate,
    pub demand: f64,
}

/// Gap-free daily demand history for one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSeries {
    pub pair: PairKey,
    pub points: Vec<DemandPoint>,
    /// Days that had at least one valid row in the log.
    pub observed_days: usize,
    /// Rows for this pair dropped because their date did not parse.
    pub skipped_rows: usize,
}

impl DemandSeries {
    pub fn empty(pair: PairKey) -> Self {
        Self {
            pair,
            points: Vec::new(),
            observed_days: 0,
            skipped_rows: 0,
        }
    }

    /// Builds a series from consecutive daily values starting at `start`.
    /// Every day counts as observed.
    pub fn from_daily(pair: PairKey, start: NaiveDate, values: &[f64]) -> Self {
        let points: Vec<DemandPoint> = start
            .iter_days()
            .zip(values)
            .map(|(date, value)| DemandPoint {
                date,
                demand: value.max(0.0),
            })
            .collect();
        Self {
            pair,
            observed_days: points.len(),
            points,
            skipped_rows: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.demand).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// Parses a `tanggal` cell permissively, truncating any time of day.
///
/// Returns `None` for anything that is not a recognisable calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Some(date) = parse_calendar_date(raw) {
        return Some(date);
    }

    // "date[ T]time[offset]": the time must be valid, then it is dropped.
    let idx = raw.find(&[' ', 'T'][..])?;
    if !is_time_of_day(raw[idx + 1..].trim()) {
        return None;
    }
    parse_calendar_date(&raw[..idx])
}

fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// `17:45`, `17:45:10.5`, optionally followed by `Z` or a UTC offset such
/// as `+07`, `+0700`, ` +07:00`.
fn is_time_of_day(raw: &str) -> bool {
    let (time, offset) = match raw.find(&['+', '-', 'Z'][..]) {
        Some(idx) => (raw[..idx].trim_end(), Some(&raw[idx..])),
        None => (raw, None),
    };
    let valid_time = TIME_FORMATS
        .iter()
        .any(|fmt| NaiveTime::parse_from_str(time, fmt).is_ok());
    valid_time && offset.map_or(true, is_utc_offset)
}

fn is_utc_offset(raw: &str) -> bool {
    if raw == "Z" {
        return true;
    }
    let Some(body) = raw.strip_prefix(&['+', '-'][..]) else {
        return false;
    };
    let digits: String = body.chars().filter(|c| *c != ':').collect();
    let colon_ok = match body.find(':') {
        None => true,
        Some(pos) => pos == 2 && body.len() == 5,
    };
    colon_ok && matches!(digits.len(), 2 | 4) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Builds the daily demand series for `pair` from the full raw log.
///
/// No matching rows yields an empty series, which callers treat as
/// insufficient history.
pub fn build_series(records: &[ConsumptionRecord], pair: &PairKey) -> DemandSeries {
    let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut skipped_rows = 0;

    for record in records.iter().filter(|r| r.matches(pair)) {
        match parse_date(&record.date) {
            Some(day) => *daily.entry(day).or_insert(0.0) += record.quantity_out,
            None => {
                skipped_rows += 1;
                debug!(pair = %pair, raw = %record.date, "Skipping row with unparseable date");
            }
        }
    }

    if skipped_rows > 0 {
        warn!(pair = %pair, skipped_rows, "Dropped rows with unparseable dates");
    }

    let (first, last) = match (daily.keys().next(), daily.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            let mut series = DemandSeries::empty(pair.clone());
            series.skipped_rows = skipped_rows;
            return series;
        }
    };

    let points = first
        .iter_days()
        .take_while(|day| *day <= last)
        .map(|date| DemandPoint {
            date,
            demand: daily.get(&date).copied().unwrap_or(0.0).max(0.0),
        })
        .collect();

    DemandSeries {
        pair: pair.clone(),
        points,
        observed_days: daily.len(),
        skipped_rows,
    }
}
