//! Yearly, monthly and per-state rollups of daily donation-count records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{DonationCountRecord, YearRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Daily,
    Total,
}

impl Measure {
    fn of(self, record: &DonationCountRecord) -> i64 {
        match self {
            Measure::Daily => record.daily,
            Measure::Total => record.total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Year,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Period {
    Year(i32),
    Month { year: i32, month: u32 },
}

impl Period {
    fn of(granularity: Granularity, date: NaiveDate) -> Self {
        match granularity {
            Granularity::Year => Period::Year(date.year()),
            Granularity::Month => Period::Month {
                year: date.year(),
                month: date.month(),
            },
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            Period::Year(year) | Period::Month { year, .. } => *year,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Year(year) => write!(f, "{year}"),
            Period::Month { year, month } => write!(f, "{year}-{month:02}"),
        }
    }
}

/// Which rows of a per-state dataset feed a rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSlice<'a> {
    /// Only the designated whole-population row.
    Aggregate(&'a str),
    /// Every row, keyed by its state.
    ByState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSeriesPoint {
    pub period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub sum: i64,
}

/// Sums `measure` per period (and state, for [`StateSlice::ByState`]) over
/// records whose year lies in `years`. Output is ascending by key; periods
/// with no source rows are absent.
pub fn aggregate(
    records: &[DonationCountRecord],
    measure: Measure,
    granularity: Granularity,
    slice: StateSlice<'_>,
    years: YearRange,
) -> Vec<TimeSeriesPoint> {
    let mut sums: BTreeMap<(Period, Option<&str>), i64> = BTreeMap::new();

    for record in records.iter().filter(|r| years.contains(r.date.year())) {
        let state = match slice {
            StateSlice::Aggregate(name) if record.state != name => continue,
            StateSlice::Aggregate(_) => None,
            StateSlice::ByState => Some(record.state.as_str()),
        };
        *sums
            .entry((Period::of(granularity, record.date), state))
            .or_insert(0) += measure.of(record);
    }

    sums.into_iter()
        .map(|((period, state), sum)| TimeSeriesPoint {
            period,
            state: state.map(str::to_string),
            sum,
        })
        .collect()
}

pub fn yearly_new_donors(
    records: &[DonationCountRecord],
    aggregate_state: &str,
    years: YearRange,
) -> Vec<TimeSeriesPoint> {
    aggregate(
        records,
        Measure::Total,
        Granularity::Year,
        StateSlice::Aggregate(aggregate_state),
        years,
    )
}

pub fn monthly_donations(
    records: &[DonationCountRecord],
    aggregate_state: &str,
    years: YearRange,
) -> Vec<TimeSeriesPoint> {
    aggregate(
        records,
        Measure::Daily,
        Granularity::Month,
        StateSlice::Aggregate(aggregate_state),
        years,
    )
}

/// `measure` summed per `(state, period)` across every row of the dataset.
pub fn by_state(
    records: &[DonationCountRecord],
    measure: Measure,
    granularity: Granularity,
    years: YearRange,
) -> Vec<TimeSeriesPoint> {
    aggregate(records, measure, granularity, StateSlice::ByState, years)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestDay {
    pub date: NaiveDate,
    pub daily: i64,
    /// Whether `date` matches the caller's notion of today.
    pub is_today: bool,
}

/// Summed `daily` of the aggregate row on the latest date it appears.
pub fn latest_day(
    records: &[DonationCountRecord],
    aggregate_state: &str,
    today: NaiveDate,
) -> Option<LatestDay> {
    let rows: Vec<&DonationCountRecord> = records
        .iter()
        .filter(|r| r.state == aggregate_state)
        .collect();
    let date = rows.iter().map(|r| r.date).max()?;
    let daily = rows.iter().filter(|r| r.date == date).map(|r| r.daily).sum();

    Some(LatestDay {
        date,
        daily,
        is_today: date == today,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearBasis {
    /// The year of the latest date present in the input.
    LatestRecord,
    Fixed(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearToDate {
    pub year: i32,
    pub through: NaiveDate,
    pub daily: i64,
}

/// Running `daily` sum of the aggregate row from January 1 of the chosen
/// year through the latest date present.
pub fn year_to_date(
    records: &[DonationCountRecord],
    aggregate_state: &str,
    basis: YearBasis,
) -> Option<YearToDate> {
    let rows: Vec<&DonationCountRecord> = records
        .iter()
        .filter(|r| r.state == aggregate_state)
        .collect();
    let latest = rows.iter().map(|r| r.date).max()?;
    let year = match basis {
        YearBasis::LatestRecord => latest.year(),
        YearBasis::Fixed(year) => year,
    };

    let in_year: Vec<&&DonationCountRecord> =
        rows.iter().filter(|r| r.date.year() == year).collect();
    let through = in_year.iter().map(|r| r.date).max()?;

    Some(YearToDate {
        year,
        through,
        daily: in_year.iter().map(|r| r.daily).sum(),
    })
}
