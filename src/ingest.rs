//! CSV ingestion of donation-count datasets and granular visit files.

use std::io;
use std::path::Path;

use anyhow::Context;
use log::info;
use serde::de::DeserializeOwned;

use crate::error::{AnalyticsError, Result};
use crate::models::{DonationCountRecord, DonorVisit};
use crate::normalize::{
    normalize_all, normalize_count, normalize_visit, MalformedPolicy, Normalized,
};

pub fn load_visits(path: &Path, policy: MalformedPolicy) -> anyhow::Result<Normalized<DonorVisit>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open visits file {}", path.display()))?;
    let visits = read_visits(file, policy)
        .with_context(|| format!("failed to load visits from {}", path.display()))?;
    info!(
        "loaded {} visits from {} ({} dropped)",
        visits.records.len(),
        path.display(),
        visits.dropped
    );
    Ok(visits)
}

pub fn load_counts(
    path: &Path,
    policy: MalformedPolicy,
) -> anyhow::Result<Normalized<DonationCountRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open counts file {}", path.display()))?;
    let counts = read_counts(file, policy)
        .with_context(|| format!("failed to load counts from {}", path.display()))?;
    info!(
        "loaded {} count rows from {} ({} dropped)",
        counts.records.len(),
        path.display(),
        counts.dropped
    );
    Ok(counts)
}

pub fn read_visits<R: io::Read>(
    reader: R,
    policy: MalformedPolicy,
) -> anyhow::Result<Normalized<DonorVisit>> {
    let rows = read_rows(reader)?;
    Ok(normalize_rows(rows, policy, normalize_visit)?)
}

pub fn read_counts<R: io::Read>(
    reader: R,
    policy: MalformedPolicy,
) -> anyhow::Result<Normalized<DonationCountRecord>> {
    let rows = read_rows(reader)?;
    Ok(normalize_rows(rows, policy, normalize_count)?)
}

type RawRows<R> = Vec<(usize, Result<R>)>;

/// Reads every data row, keeping per-row decode failures as values so the
/// malformed-record policy can decide about them.
fn read_rows<R, T>(reader: R) -> anyhow::Result<RawRows<T>>
where
    R: io::Read,
    T: DeserializeOwned,
{
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers().context("failed to read CSV header")?.clone();

    let mut rows = Vec::new();
    for (index, result) in csv_reader.records().enumerate() {
        let fallback_line = index + 2;
        let row = match result {
            Ok(record) => {
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                let decoded = record
                    .deserialize::<T>(Some(&headers))
                    .map_err(|err| AnalyticsError::MalformedRecord {
                        line,
                        field: "row",
                        reason: err.to_string(),
                    });
                (line, decoded)
            }
            Err(err) => (
                fallback_line,
                Err(AnalyticsError::MalformedRecord {
                    line: fallback_line,
                    field: "row",
                    reason: err.to_string(),
                }),
            ),
        };
        rows.push(row);
    }
    Ok(rows)
}

fn normalize_rows<R, T, F>(rows: RawRows<R>, policy: MalformedPolicy, normalize: F) -> Result<Normalized<T>>
where
    F: Fn(usize, &R) -> Result<T>,
{
    normalize_all(rows, policy, |line, row: &Result<R>| match row {
        Ok(raw) => normalize(line, raw),
        Err(err) => Err(err.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_granular_visits_with_birth_date_column() {
        let csv = "donor_id,visit_date,birth_date\n\
                   d1,2021-01-01,1990\n\
                   d1,2022-06-15,1990\n\
                   d2,bad-date,1985\n";
        let visits = read_visits(csv.as_bytes(), MalformedPolicy::Drop).unwrap();
        assert_eq!(visits.records.len(), 2);
        assert_eq!(visits.dropped, 1);
        assert_eq!(visits.records[1].birth_year, 1990);
    }

    #[test]
    fn abort_policy_reports_line() {
        let csv = "donor_id,visit_date,birth_year\n\
                   d1,2021-01-01,1990\n\
                   d2,bad-date,1985\n";
        let err = read_visits(csv.as_bytes(), MalformedPolicy::Abort).unwrap_err();
        let engine_err = err.downcast_ref::<AnalyticsError>().unwrap();
        assert!(matches!(
            engine_err,
            AnalyticsError::MalformedRecord { line: 3, field: "visit_date", .. }
        ));
    }

    #[test]
    fn reads_donations_without_total_column() {
        let csv = "date,state,daily,blood_a\n\
                   2024-01-01,Malaysia,1200,300\n\
                   2024-01-01,Johor,150,40\n";
        let counts = read_counts(csv.as_bytes(), MalformedPolicy::Abort).unwrap();
        assert_eq!(counts.records.len(), 2);
        assert_eq!(counts.records[0].daily, 1200);
        assert_eq!(counts.records[0].total, 0);
    }

    #[test]
    fn reads_new_donors_without_daily_column() {
        let csv = "date,state,17-24,total\n\
                   2024-01-01,Malaysia,50,90\n";
        let counts = read_counts(csv.as_bytes(), MalformedPolicy::Abort).unwrap();
        assert_eq!(counts.records[0].total, 90);
        assert_eq!(counts.records[0].daily, 0);
    }
}
