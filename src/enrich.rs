//! Per-visit derivations: donor status, previous-visit linkage, gaps and age.

use chrono::{Datelike, NaiveDate};
use log::{debug, warn};

use crate::cohort::DonorCohorts;
use crate::models::{DonorStatus, DonorVisit, EnrichedVisit};

const DAYS_PER_YEAR: f64 = 365.0;

/// Enriches every visit, returning them in input order.
///
/// Each donor's visits are ordered by date with ties kept in input order,
/// and each visit is linked to the one immediately before it.
pub fn enrich_visits(visits: &[DonorVisit], cohorts: &DonorCohorts) -> Vec<EnrichedVisit> {
    let previous = previous_visit_dates(visits);

    visits
        .iter()
        .zip(previous)
        .map(|(visit, previous_visit_date)| enrich_one(visit, previous_visit_date, cohorts))
        .collect()
}

fn previous_visit_dates(visits: &[DonorVisit]) -> Vec<Option<NaiveDate>> {
    let mut order: Vec<usize> = (0..visits.len()).collect();
    // stable: equal (donor, date) keys keep input order
    order.sort_by(|&a, &b| {
        let (left, right) = (&visits[a], &visits[b]);
        left.donor_id
            .cmp(&right.donor_id)
            .then(left.visit_date.cmp(&right.visit_date))
    });

    let mut previous = vec![None; visits.len()];
    for pair in order.windows(2) {
        let (prior, current) = (&visits[pair[0]], &visits[pair[1]]);
        if prior.donor_id == current.donor_id {
            previous[pair[1]] = Some(prior.visit_date);
        }
    }
    previous
}

fn enrich_one(
    visit: &DonorVisit,
    previous_visit_date: Option<NaiveDate>,
    cohorts: &DonorCohorts,
) -> EnrichedVisit {
    let donation_year = visit.visit_date.year();
    let first_donation_year = match cohorts.first_donation_year(&visit.donor_id) {
        Some(year) => year,
        None => {
            warn!(
                "no cohort for donor {}, treating {} as first donation year",
                visit.donor_id, donation_year
            );
            donation_year
        }
    };

    let donor_status = if donation_year == first_donation_year {
        DonorStatus::New
    } else {
        DonorStatus::Returning
    };

    let days_between_visits =
        previous_visit_date.map(|previous| (visit.visit_date - previous).num_days());

    let years_since_first_donation = match (donor_status, days_between_visits) {
        (DonorStatus::Returning, Some(days)) => Some(days as f64 / DAYS_PER_YEAR),
        (DonorStatus::Returning, None) => {
            debug!(
                "returning visit for {} on {} has no previous visit",
                visit.donor_id, visit.visit_date
            );
            None
        }
        (DonorStatus::New, _) => None,
    };

    EnrichedVisit {
        donor_id: visit.donor_id.clone(),
        visit_date: visit.visit_date,
        birth_year: visit.birth_year,
        donation_year,
        first_donation_year,
        donor_status,
        previous_visit_date,
        days_between_visits,
        age_at_visit: donation_year - visit.birth_year,
        years_since_first_donation,
    }
}
