use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DonorId(String);

impl DonorId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DonorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonorVisit {
    pub donor_id: DonorId,
    pub visit_date: NaiveDate,
    pub birth_year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationCountRecord {
    pub state: String,
    pub date: NaiveDate,
    pub daily: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DonorStatus {
    New,
    Returning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedVisit {
    pub donor_id: DonorId,
    pub visit_date: NaiveDate,
    pub birth_year: i32,
    pub donation_year: i32,
    pub first_donation_year: i32,
    pub donor_status: DonorStatus,
    pub previous_visit_date: Option<NaiveDate>,
    pub days_between_visits: Option<i64>,
    pub age_at_visit: i32,
    /// Days since the previous visit divided by 365, for Returning visits.
    pub years_since_first_donation: Option<f64>,
}

/// Inclusive range of calendar years. An inverted range contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    pub start_year: i32,
    pub end_year: i32,
}

impl YearRange {
    pub fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.end_year)
    }
}
