use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use sqlx::postgres::PgPoolOptions;

mod age_groups;
mod cohort;
mod config;
mod db;
mod enrich;
mod error;
mod gate;
mod ingest;
mod models;
mod normalize;
mod report;
mod retention;
mod trends;

use config::ReportConfig;
use gate::FreshnessMarker;
use models::YearRange;
use normalize::MalformedPolicy;
use trends::YearBasis;

const DONATIONS_DATASET: &str = "donations";
const NEW_DONORS_DATASET: &str = "new-donors";

#[derive(Parser)]
#[command(name = "blood-donor-analytics")]
#[command(about = "Donor cohort, retention and donation trend reporting", long_about = None)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Dataset {
    Donations,
    NewDonors,
    Visits,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(clap::Args, Clone)]
struct RangeArgs {
    #[arg(long, default_value_t = config::DEFAULT_START_YEAR)]
    start_year: i32,
    #[arg(long, default_value_t = config::DEFAULT_END_YEAR)]
    end_year: i32,
    /// Name of the whole-population row in per-state datasets
    #[arg(long, default_value = config::DEFAULT_AGGREGATE_STATE)]
    state: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import a CSV dataset
    Import {
        #[arg(long, value_enum)]
        dataset: Dataset,
        #[arg(long)]
        csv: PathBuf,
        /// Fail on the first malformed row instead of dropping it
        #[arg(long)]
        abort_on_malformed: bool,
        /// Marker file to write when new rows were stored
        #[arg(long)]
        marker: Option<PathBuf>,
    },
    /// Print retention rates across all visits
    Retention,
    /// Print yearly new donors and monthly donations
    Trends {
        #[command(flatten)]
        range: RangeArgs,
        /// Also print monthly donations for every state row
        #[arg(long)]
        by_state: bool,
    },
    /// Generate the full report
    Report {
        #[command(flatten)]
        range: RangeArgs,
        /// Compute year-to-date for the current calendar year
        #[arg(long)]
        wall_clock_year: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Only run when this marker says new data arrived; clear it afterwards
        #[arg(long)]
        marker: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import {
            dataset,
            csv,
            abort_on_malformed,
            marker,
        } => {
            let policy = if abort_on_malformed {
                MalformedPolicy::Abort
            } else {
                MalformedPolicy::Drop
            };
            let (stored, dropped) = import(&pool, dataset, &csv, policy).await?;
            println!(
                "Stored {stored} rows from {} ({dropped} malformed rows dropped).",
                csv.display()
            );
            if let Some(path) = marker {
                if stored > 0 {
                    FreshnessMarker::new(path).mark()?;
                }
            }
        }
        Commands::Retention => {
            let visits = db::fetch_visits(&pool).await?;
            let cohorts = cohort::resolve_cohorts(&visits);
            let enriched = enrich::enrich_visits(&visits, &cohorts);
            let table = retention::compute_retention(&enriched);
            if cohorts.is_empty() {
                warn!("no visits stored; run import --dataset visits first");
            } else {
                info!("resolved {} donor cohorts", cohorts.len());
            }
            if table.is_undefined() {
                warn!("no returning visits among {} visits", visits.len());
            }

            let mut output = String::new();
            report::render_retention(&mut output, &table);
            print!("{output}");
        }
        Commands::Trends { range, by_state } => {
            let config = report_config(&range, YearBasis::LatestRecord);
            let new_donors = db::fetch_counts(&pool, NEW_DONORS_DATASET).await?;
            let donations = db::fetch_counts(&pool, DONATIONS_DATASET).await?;

            let mut output = String::new();
            output.push_str("Annual new donors:\n");
            report::render_series(
                &mut output,
                &trends::yearly_new_donors(&new_donors, &config.aggregate_state, config.years),
            );
            output.push_str("Monthly donations:\n");
            report::render_series(
                &mut output,
                &trends::monthly_donations(&donations, &config.aggregate_state, config.years),
            );
            if by_state {
                output.push_str("Monthly donations by state:\n");
                report::render_series(
                    &mut output,
                    &trends::by_state(
                        &donations,
                        trends::Measure::Daily,
                        trends::Granularity::Month,
                        config.years,
                    ),
                );
            }
            print!("{output}");
        }
        Commands::Report {
            range,
            wall_clock_year,
            format,
            out,
            marker,
        } => {
            let marker = marker.map(FreshnessMarker::new);
            if let Some(marker) = &marker {
                if !marker.is_open()? {
                    info!(
                        "no new data signalled by {}, skipping report",
                        marker.path().display()
                    );
                    return Ok(());
                }
            }

            let today = Utc::now().date_naive();
            let basis = if wall_clock_year {
                YearBasis::Fixed(today.year())
            } else {
                YearBasis::LatestRecord
            };
            let config = report_config(&range, basis);

            let visits = db::fetch_visits(&pool).await?;
            let donations = db::fetch_counts(&pool, DONATIONS_DATASET).await?;
            let new_donors = db::fetch_counts(&pool, NEW_DONORS_DATASET).await?;
            info!(
                "building report from {} visits, {} donation rows, {} new-donor rows",
                visits.len(),
                donations.len(),
                new_donors.len()
            );

            let analytics = report::build_report(&config, &visits, &donations, &new_donors, today);
            let rendered = match format {
                OutputFormat::Markdown => report::render_markdown(&analytics),
                OutputFormat::Json => report::render_json(&analytics)?,
            };
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());

            if let Some(marker) = &marker {
                marker.clear()?;
            }
        }
    }

    Ok(())
}

fn report_config(range: &RangeArgs, year_basis: YearBasis) -> ReportConfig {
    ReportConfig {
        years: YearRange::new(range.start_year, range.end_year),
        aggregate_state: range.state.clone(),
        year_basis,
        ..ReportConfig::default()
    }
}

async fn import(
    pool: &sqlx::PgPool,
    dataset: Dataset,
    csv: &Path,
    policy: MalformedPolicy,
) -> anyhow::Result<(usize, usize)> {
    match dataset {
        Dataset::Visits => {
            let visits = ingest::load_visits(csv, policy)?;
            let source_name = csv
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| csv.display().to_string());
            let stored = db::import_visits(pool, &source_name, &visits.records).await?;
            Ok((stored, visits.dropped))
        }
        Dataset::Donations | Dataset::NewDonors => {
            let key = match dataset {
                Dataset::NewDonors => NEW_DONORS_DATASET,
                _ => DONATIONS_DATASET,
            };
            let counts = ingest::load_counts(csv, policy)?;
            let stored = db::import_counts(pool, key, &counts.records).await?;
            Ok((stored, counts.dropped))
        }
    }
}
