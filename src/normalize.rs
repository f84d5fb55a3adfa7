//! Validated construction of visit and donation-count records from raw rows.

use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use serde::Deserialize;

use crate::error::{AnalyticsError, Result};
use crate::models::{DonationCountRecord, DonorId, DonorVisit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    #[default]
    Drop,
    Abort,
}

/// A visit row as it arrives from the granular source, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVisitRow {
    pub donor_id: Option<String>,
    pub visit_date: Option<String>,
    #[serde(alias = "birth_date")]
    pub birth_year: Option<String>,
}

/// A per-state daily row. `daily` and `total` are `None` when the column
/// is absent from the dataset, and `Some("")` when present but empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCountRow {
    pub state: Option<String>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "present_field")]
    pub daily: Option<String>,
    #[serde(default, deserialize_with = "present_field")]
    pub total: Option<String>,
}

fn present_field<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub dropped: usize,
}

pub fn normalize_visit(line: usize, row: &RawVisitRow) -> Result<DonorVisit> {
    let donor_id = required(line, "donor_id", row.donor_id.as_deref())?;
    let visit_date = parse_date(line, "visit_date", row.visit_date.as_deref())?;
    let birth_year = parse_birth_year(line, row.birth_year.as_deref())?;

    Ok(DonorVisit {
        donor_id: DonorId::new(donor_id),
        visit_date,
        birth_year,
    })
}

pub fn normalize_count(line: usize, row: &RawCountRow) -> Result<DonationCountRecord> {
    let state = required(line, "state", row.state.as_deref())?;
    let date = parse_date(line, "date", row.date.as_deref())?;
    let daily = parse_count(line, "daily", row.daily.as_deref())?;
    let total = parse_count(line, "total", row.total.as_deref())?;

    Ok(DonationCountRecord {
        state: state.to_string(),
        date,
        daily,
        total,
    })
}

/// Applies `normalize` to every `(line, row)` pair under `policy`.
pub fn normalize_all<R, T, F>(
    rows: impl IntoIterator<Item = (usize, R)>,
    policy: MalformedPolicy,
    normalize: F,
) -> Result<Normalized<T>>
where
    F: Fn(usize, &R) -> Result<T>,
{
    let mut records = Vec::new();
    let mut dropped = 0usize;

    for (line, row) in rows {
        match normalize(line, &row) {
            Ok(record) => records.push(record),
            Err(err) if policy == MalformedPolicy::Drop => {
                warn!("dropping row: {err}");
                dropped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(Normalized { records, dropped })
}

fn required<'a>(line: usize, field: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(malformed(line, field, "is missing")),
    }
}

pub fn parse_date(line: usize, field: &'static str, value: Option<&str>) -> Result<NaiveDate> {
    let raw = required(line, field, value)?;
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(stamp.date());
        }
    }
    Err(malformed(line, field, format!("has unparsable date {raw:?}")))
}

fn parse_birth_year(line: usize, value: Option<&str>) -> Result<i32> {
    let raw = required(line, "birth_year", value)?;
    let year = match raw.parse::<i32>() {
        Ok(year) => year,
        Err(_) => match raw.parse::<f64>() {
            Ok(float) if float.fract() == 0.0 && float.abs() < 1e6 => float as i32,
            _ => return Err(malformed(line, "birth_year", format!("is not a year: {raw:?}"))),
        },
    };

    if !(1000..=9999).contains(&year) {
        return Err(malformed(line, "birth_year", format!("is not a four-digit year: {year}")));
    }
    Ok(year)
}

fn parse_count(line: usize, field: &'static str, value: Option<&str>) -> Result<i64> {
    let Some(raw) = value else {
        return Ok(0);
    };
    let raw = required(line, field, Some(raw))?;
    match raw.parse::<i64>() {
        Ok(count) if count >= 0 => Ok(count),
        Ok(count) => Err(malformed(line, field, format!("is negative: {count}"))),
        Err(_) => Err(malformed(line, field, format!("is not an integer: {raw:?}"))),
    }
}

fn malformed(line: usize, field: &'static str, reason: impl Into<String>) -> AnalyticsError {
    AnalyticsError::MalformedRecord {
        line,
        field,
        reason: reason.into(),
    }
}
