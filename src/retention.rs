use serde::Serialize;

use crate::error::AnalyticsError;
use crate::models::{DonorStatus, EnrichedVisit};

pub const RETENTION_WINDOWS: std::ops::RangeInclusive<u32> = 1..=5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Rate {
    Defined { fraction: f64 },
    Undefined,
}

impl Rate {
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Rate::Defined { fraction } => Some(*fraction),
            Rate::Undefined => None,
        }
    }

    /// Two-decimal percentage, e.g. `"20.00%"`.
    pub fn percentage(&self) -> Option<String> {
        self.fraction().map(|fraction| format!("{:.2}%", fraction * 100.0))
    }

    pub fn into_result(self) -> Result<f64, AnalyticsError> {
        self.fraction().ok_or(AnalyticsError::EmptyPopulation {
            what: "returning visits",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionWindow {
    pub window_years: u32,
    pub rate: Rate,
    pub percentage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionTable {
    /// Returning visits with a computable gap; the shared denominator.
    pub population: usize,
    pub windows: Vec<RetentionWindow>,
}

impl RetentionTable {
    pub fn rate(&self, window_years: u32) -> Option<Rate> {
        self.windows
            .iter()
            .find(|w| w.window_years == window_years)
            .map(|w| w.rate)
    }

    pub fn is_undefined(&self) -> bool {
        self.population == 0
    }
}

/// Retention over the Returning visits that carry `years_since_first_donation`.
pub fn compute_retention(visits: &[EnrichedVisit]) -> RetentionTable {
    let gaps: Vec<f64> = visits
        .iter()
        .filter(|v| v.donor_status == DonorStatus::Returning)
        .filter_map(|v| v.years_since_first_donation)
        .collect();
    retention_from_gaps(&gaps)
}

pub fn retention_from_gaps(gaps: &[f64]) -> RetentionTable {
    let population = gaps.len();

    let windows = RETENTION_WINDOWS
        .map(|window_years| {
            let rate = if population == 0 {
                Rate::Undefined
            } else {
                let within = gaps
                    .iter()
                    .filter(|&&gap| gap <= f64::from(window_years))
                    .count();
                Rate::Defined {
                    fraction: within as f64 / population as f64,
                }
            };
            RetentionWindow {
                window_years,
                rate,
                percentage: rate.percentage(),
            }
        })
        .collect();

    RetentionTable {
        population,
        windows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::resolve_cohorts;
    use crate::enrich::enrich_visits;
    use crate::models::{DonorId, DonorVisit};
    use chrono::NaiveDate;

    #[test]
    fn concrete_windows() {
        let table = retention_from_gaps(&[0.5, 1.2, 2.9, 4.1, 6.0]);
        assert_eq!(table.population, 5);
        assert_eq!(table.rate(1), Some(Rate::Defined { fraction: 0.2 }));
        assert_eq!(table.rate(2), Some(Rate::Defined { fraction: 0.4 }));
        assert_eq!(table.rate(5), Some(Rate::Defined { fraction: 0.8 }));
        assert_eq!(table.windows[0].percentage.as_deref(), Some("20.00%"));
        assert_eq!(table.windows[4].percentage.as_deref(), Some("80.00%"));
    }

    #[test]
    fn fractions_never_decrease() {
        let table = retention_from_gaps(&[3.3, 0.1, 9.0, 1.0, 2.0, 2.5, 4.99, 5.0]);
        let fractions: Vec<f64> = table
            .windows
            .iter()
            .map(|w| w.rate.fraction().unwrap())
            .collect();
        assert_eq!(fractions.len(), 5);
        assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
    }

    #[test]
    fn empty_population_is_undefined_for_every_window() {
        let visits = vec![DonorVisit {
            donor_id: DonorId::new("solo"),
            visit_date: NaiveDate::from_ymd_opt(2022, 3, 3).unwrap(),
            birth_year: 1995,
        }];
        let enriched = enrich_visits(&visits, &resolve_cohorts(&visits));
        let table = compute_retention(&enriched);

        assert!(table.is_undefined());
        assert_eq!(table.windows.len(), 5);
        for window in &table.windows {
            assert_eq!(window.rate, Rate::Undefined);
            assert_eq!(window.percentage, None);
            assert_eq!(
                window.rate.into_result(),
                Err(AnalyticsError::EmptyPopulation {
                    what: "returning visits"
                })
            );
        }
    }

    #[test]
    fn only_returning_visits_count() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let visits = vec![
            DonorVisit {
                donor_id: DonorId::new("a"),
                visit_date: date(2020, 1, 1),
                birth_year: 1990,
            },
            DonorVisit {
                donor_id: DonorId::new("a"),
                visit_date: date(2020, 6, 1),
                birth_year: 1990,
            },
            DonorVisit {
                donor_id: DonorId::new("a"),
                visit_date: date(2023, 6, 1),
                birth_year: 1990,
            },
        ];
        let table = compute_retention(&enrich_visits(&visits, &resolve_cohorts(&visits)));
        assert_eq!(table.population, 1);
        assert_eq!(table.rate(2), Some(Rate::Defined { fraction: 0.0 }));
        assert_eq!(table.rate(3), Some(Rate::Defined { fraction: 1.0 }));
    }
}
