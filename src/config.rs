use crate::age_groups::{AgeBand, DEFAULT_AGE_BANDS};
use crate::models::YearRange;
use crate::trends::YearBasis;

pub const DEFAULT_START_YEAR: i32 = 2019;
pub const DEFAULT_END_YEAR: i32 = 2024;
pub const DEFAULT_AGGREGATE_STATE: &str = "Malaysia";

/// Parameters for a single report run.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub years: YearRange,
    /// Name of the whole-population row in per-state datasets.
    pub aggregate_state: String,
    pub year_basis: YearBasis,
    pub age_bands: Vec<AgeBand>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            years: YearRange::new(DEFAULT_START_YEAR, DEFAULT_END_YEAR),
            aggregate_state: DEFAULT_AGGREGATE_STATE.to_string(),
            year_basis: YearBasis::LatestRecord,
            age_bands: DEFAULT_AGE_BANDS.to_vec(),
        }
    }
}
