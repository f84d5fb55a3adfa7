use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::age_groups::{self, AgeGroupYearCount};
use crate::cohort;
use crate::config::ReportConfig;
use crate::enrich;
use crate::models::{DonationCountRecord, DonorVisit, YearRange};
use crate::retention::{self, Rate, RetentionTable};
use crate::trends::{self, Granularity, LatestDay, Measure, TimeSeriesPoint, YearToDate};

#[derive(Debug, Clone, Serialize)]
pub struct VisitSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub years: YearRange,
    pub aggregate_state: String,
    pub yearly_new_donors: Vec<TimeSeriesPoint>,
    pub monthly_donations: Vec<TimeSeriesPoint>,
    /// Yearly donations for every state row.
    pub state_donations: Vec<TimeSeriesPoint>,
    /// Yearly new donors for every state row.
    pub state_new_donors: Vec<TimeSeriesPoint>,
    pub latest_day: Option<LatestDay>,
    pub year_to_date: Option<YearToDate>,
    pub retention: RetentionTable,
    pub visit_span: Option<VisitSpan>,
    pub active_donors_by_year: BTreeMap<i32, usize>,
    pub age_groups: Vec<AgeGroupYearCount>,
}

pub fn build_report(
    config: &ReportConfig,
    visits: &[DonorVisit],
    donations: &[DonationCountRecord],
    new_donors: &[DonationCountRecord],
    today: NaiveDate,
) -> AnalyticsReport {
    let cohorts = cohort::resolve_cohorts(visits);
    let enriched = enrich::enrich_visits(visits, &cohorts);
    let state = config.aggregate_state.as_str();

    let visit_span = match (
        visits.iter().map(|v| v.visit_date).min(),
        visits.iter().map(|v| v.visit_date).max(),
    ) {
        (Some(first), Some(last)) => Some(VisitSpan { first, last }),
        _ => None,
    };

    AnalyticsReport {
        years: config.years,
        aggregate_state: config.aggregate_state.clone(),
        yearly_new_donors: trends::yearly_new_donors(new_donors, state, config.years),
        monthly_donations: trends::monthly_donations(donations, state, config.years),
        state_donations: trends::by_state(
            donations,
            Measure::Daily,
            Granularity::Year,
            config.years,
        ),
        state_new_donors: trends::by_state(
            new_donors,
            Measure::Total,
            Granularity::Year,
            config.years,
        ),
        latest_day: trends::latest_day(donations, state, today),
        year_to_date: trends::year_to_date(donations, state, config.year_basis),
        retention: retention::compute_retention(&enriched),
        visit_span,
        active_donors_by_year: age_groups::active_donors_by_year(&enriched),
        age_groups: age_groups::tabulate_age_groups(&enriched, &config.age_bands, config.years),
    }
}

pub fn render_json(report: &AnalyticsReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render_retention(output: &mut String, table: &RetentionTable) {
    if let Some(Err(err)) = table.rate(1).map(Rate::into_result) {
        let _ = writeln!(output, "{err}; retention is undefined.");
        return;
    }
    for window in &table.windows {
        let _ = writeln!(
            output,
            "- Retention rate {} year{}: {}",
            window.window_years,
            if window.window_years == 1 { "" } else { "s" },
            window.percentage.as_deref().unwrap_or("undefined")
        );
    }
    let _ = writeln!(output, "Based on {} returning visits.", table.population);
}

pub fn render_markdown(report: &AnalyticsReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Blood Donation Report");
    let _ = writeln!(
        output,
        "Generated for {} ({})",
        report.aggregate_state, report.years
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Latest Donations");
    match &report.latest_day {
        Some(latest) if latest.is_today => {
            let _ = writeln!(
                output,
                "Total blood donations today: +{} (last update: {})",
                latest.daily, latest.date
            );
        }
        Some(latest) => {
            let _ = writeln!(
                output,
                "No donation data for today; latest day {} had {} donations.",
                latest.date, latest.daily
            );
        }
        None => {
            let _ = writeln!(output, "No donation data available.");
        }
    }
    if let Some(ytd) = &report.year_to_date {
        let _ = writeln!(
            output,
            "Year to date {}: {} donations (through {})",
            ytd.year, ytd.daily, ytd.through
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Annual New Donors");
    render_series(&mut output, &report.yearly_new_donors);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Donations");
    render_series(&mut output, &report.monthly_donations);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Donations By State");
    render_state_series(&mut output, &report.state_donations);

    let _ = writeln!(output);
    let _ = writeln!(output, "## New Donors By State");
    render_state_series(&mut output, &report.state_new_donors);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Retention");
    render_retention(&mut output, &report.retention);
    if let Some(span) = &report.visit_span {
        let _ = writeln!(output, "(last update: {}-{})", span.first, span.last);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Active Donors Per Year");
    if report.active_donors_by_year.is_empty() {
        let _ = writeln!(output, "No visits recorded.");
    } else {
        for (year, count) in &report.active_donors_by_year {
            let _ = writeln!(output, "- {year}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Donors By Age Group");
    if report.age_groups.is_empty() {
        let _ = writeln!(output, "No donors in the tracked age bands for this range.");
    } else {
        for group in &report.age_groups {
            let _ = writeln!(
                output,
                "- {} in {}: {} donors",
                group.age_band, group.year, group.unique_donor_count
            );
        }
    }

    output
}

pub fn render_series(output: &mut String, points: &[TimeSeriesPoint]) {
    if points.is_empty() {
        let _ = writeln!(output, "No data for this range.");
        return;
    }
    for point in points {
        match &point.state {
            Some(state) => {
                let _ = writeln!(output, "- {} {}: {}", point.period, state, point.sum);
            }
            None => {
                let _ = writeln!(output, "- {}: {}", point.period, point.sum);
            }
        }
    }
}

/// Per-state points under one heading per year.
pub fn render_state_series(output: &mut String, points: &[TimeSeriesPoint]) {
    if points.is_empty() {
        let _ = writeln!(output, "No data for this range.");
        return;
    }
    let mut current_year = None;
    for point in points {
        let year = point.period.year();
        if current_year != Some(year) {
            let _ = writeln!(output, "### {year}");
            current_year = Some(year);
        }
        let _ = writeln!(
            output,
            "- {}: {}",
            point.state.as_deref().unwrap_or("all"),
            point.sum
        );
    }
}
