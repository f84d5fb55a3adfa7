use std::collections::HashMap;

use chrono::Datelike;

use crate::models::{DonorId, DonorVisit};

/// First donation year per donor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DonorCohorts {
    first_years: HashMap<DonorId, i32>,
}

impl DonorCohorts {
    pub fn first_donation_year(&self, donor_id: &DonorId) -> Option<i32> {
        self.first_years.get(donor_id).copied()
    }

    pub fn len(&self) -> usize {
        self.first_years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_years.is_empty()
    }
}

pub fn resolve_cohorts(visits: &[DonorVisit]) -> DonorCohorts {
    let mut first_years: HashMap<DonorId, i32> = HashMap::new();

    for visit in visits {
        let year = visit.visit_date.year();
        first_years
            .entry(visit.donor_id.clone())
            .and_modify(|first| *first = (*first).min(year))
            .or_insert(year);
    }

    DonorCohorts { first_years }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn visit(donor: &str, y: i32, m: u32, d: u32) -> DonorVisit {
        DonorVisit {
            donor_id: DonorId::new(donor),
            visit_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            birth_year: 1990,
        }
    }

    #[test]
    fn first_year_is_minimum_regardless_of_order() {
        let visits = vec![
            visit("a", 2023, 3, 1),
            visit("b", 2020, 1, 1),
            visit("a", 2019, 12, 31),
            visit("a", 2021, 5, 5),
        ];
        let cohorts = resolve_cohorts(&visits);

        let mut reversed = visits.clone();
        reversed.reverse();
        assert_eq!(cohorts, resolve_cohorts(&reversed));

        assert_eq!(cohorts.len(), 2);
        assert_eq!(cohorts.first_donation_year(&DonorId::new("a")), Some(2019));
        assert_eq!(cohorts.first_donation_year(&DonorId::new("b")), Some(2020));
        assert_eq!(cohorts.first_donation_year(&DonorId::new("c")), None);
    }

    #[test]
    fn empty_input_has_no_cohorts() {
        assert!(resolve_cohorts(&[]).is_empty());
    }
}
