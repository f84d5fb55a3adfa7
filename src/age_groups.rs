use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::models::{DonorId, EnrichedVisit, YearRange};

/// Half-open age interval `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AgeBand {
    pub lower: i32,
    pub upper: i32,
}

impl AgeBand {
    pub const fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, age: i32) -> bool {
        (self.lower..self.upper).contains(&age)
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.lower, self.upper - 1)
    }
}

pub const DEFAULT_AGE_BANDS: [AgeBand; 7] = [
    AgeBand::new(17, 25),
    AgeBand::new(25, 30),
    AgeBand::new(30, 35),
    AgeBand::new(35, 40),
    AgeBand::new(40, 45),
    AgeBand::new(45, 50),
    AgeBand::new(50, 55),
];

pub fn band_for_age(bands: &[AgeBand], age: i32) -> Option<AgeBand> {
    bands.iter().copied().find(|band| band.contains(age))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeGroupYearCount {
    pub age_band: String,
    pub year: i32,
    pub unique_donor_count: usize,
}

/// Distinct donors per `(band, donation year)`, ordered by band then year.
/// Ages outside every band are left out; only observed groups are emitted.
pub fn tabulate_age_groups(
    visits: &[EnrichedVisit],
    bands: &[AgeBand],
    years: YearRange,
) -> Vec<AgeGroupYearCount> {
    let mut groups: BTreeMap<(AgeBand, i32), HashSet<&DonorId>> = BTreeMap::new();

    for visit in visits.iter().filter(|v| years.contains(v.donation_year)) {
        if let Some(band) = band_for_age(bands, visit.age_at_visit) {
            groups
                .entry((band, visit.donation_year))
                .or_default()
                .insert(&visit.donor_id);
        }
    }

    groups
        .into_iter()
        .map(|((band, year), donors)| AgeGroupYearCount {
            age_band: band.label(),
            year,
            unique_donor_count: donors.len(),
        })
        .collect()
}

/// Distinct donors with at least one visit in each donation year.
pub fn active_donors_by_year(visits: &[EnrichedVisit]) -> BTreeMap<i32, usize> {
    let mut per_year: BTreeMap<i32, HashSet<&DonorId>> = BTreeMap::new();
    for visit in visits {
        per_year
            .entry(visit.donation_year)
            .or_default()
            .insert(&visit.donor_id);
    }
    per_year
        .into_iter()
        .map(|(year, donors)| (year, donors.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::resolve_cohorts;
    use crate::enrich::enrich_visits;
    use crate::models::DonorVisit;
    use chrono::NaiveDate;

    fn enriched(rows: &[(&str, i32, i32)]) -> Vec<EnrichedVisit> {
        let visits: Vec<DonorVisit> = rows
            .iter()
            .enumerate()
            .map(|(i, (donor, year, birth))| DonorVisit {
                donor_id: DonorId::new(*donor),
                visit_date: NaiveDate::from_ymd_opt(*year, 1 + (i % 12) as u32, 1).unwrap(),
                birth_year: *birth,
            })
            .collect();
        enrich_visits(&visits, &resolve_cohorts(&visits))
    }

    #[test]
    fn band_boundaries_are_half_open() {
        assert_eq!(
            band_for_age(&DEFAULT_AGE_BANDS, 25).map(|b| b.label()),
            Some("25-29".to_string())
        );
        assert_eq!(
            band_for_age(&DEFAULT_AGE_BANDS, 17).map(|b| b.label()),
            Some("17-24".to_string())
        );
        assert_eq!(
            band_for_age(&DEFAULT_AGE_BANDS, 54).map(|b| b.label()),
            Some("50-54".to_string())
        );
        assert_eq!(band_for_age(&DEFAULT_AGE_BANDS, 16), None);
        assert_eq!(band_for_age(&DEFAULT_AGE_BANDS, 55), None);
    }

    #[test]
    fn counts_distinct_donors_not_visits() {
        let visits = enriched(&[
            ("a", 2022, 1996),
            ("a", 2022, 1996),
            ("b", 2022, 1995),
            ("c", 2023, 1990),
        ]);
        let table = tabulate_age_groups(&visits, &DEFAULT_AGE_BANDS, YearRange::new(2019, 2024));

        assert_eq!(
            table,
            vec![
                AgeGroupYearCount {
                    age_band: "25-29".to_string(),
                    year: 2022,
                    unique_donor_count: 2,
                },
                AgeGroupYearCount {
                    age_band: "30-34".to_string(),
                    year: 2023,
                    unique_donor_count: 1,
                },
            ]
        );
    }

    #[test]
    fn excludes_out_of_band_ages_and_years() {
        let visits = enriched(&[
            ("young", 2022, 2006),
            ("old", 2022, 1967),
            ("early", 2015, 1990),
        ]);
        let table = tabulate_age_groups(&visits, &DEFAULT_AGE_BANDS, YearRange::new(2019, 2024));
        assert!(table.is_empty());
    }

    #[test]
    fn active_donors_are_unique_per_year() {
        let visits = enriched(&[
            ("a", 2021, 1990),
            ("a", 2021, 1990),
            ("b", 2021, 1990),
            ("a", 2022, 1990),
        ]);
        let active = active_donors_by_year(&visits);
        assert_eq!(active.get(&2021), Some(&2));
        assert_eq!(active.get(&2022), Some(&1));
        assert_eq!(active.len(), 2);
    }
}
