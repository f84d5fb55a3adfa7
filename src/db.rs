use std::collections::HashMap;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{DonationCountRecord, DonorId, DonorVisit};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Upserts daily rows of one dataset. Returns rows inserted or changed.
pub async fn import_counts(
    pool: &PgPool,
    dataset: &str,
    records: &[DonationCountRecord],
) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut affected = 0usize;

    for record in records {
        let result = sqlx::query(
            r#"
            INSERT INTO blood_analytics.donation_counts AS dc (dataset, state, date, daily, total)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (dataset, state, date) DO UPDATE
            SET daily = EXCLUDED.daily, total = EXCLUDED.total
            WHERE dc.daily <> EXCLUDED.daily OR dc.total <> EXCLUDED.total
            "#,
        )
        .bind(dataset)
        .bind(&record.state)
        .bind(record.date)
        .bind(record.daily)
        .bind(record.total)
        .execute(&mut *tx)
        .await?;

        affected += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(affected)
}

/// Inserts visits in order. Re-importing the same file is a no-op.
pub async fn import_visits(
    pool: &PgPool,
    source_name: &str,
    visits: &[DonorVisit],
) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut occurrences: HashMap<(&DonorId, chrono::NaiveDate), usize> = HashMap::new();
    let mut inserted = 0usize;

    for visit in visits {
        let n = occurrences
            .entry((&visit.donor_id, visit.visit_date))
            .or_insert(0);
        *n += 1;
        let source_key = format!("{source_name}:{}:{}:{n}", visit.donor_id, visit.visit_date);

        let result = sqlx::query(
            r#"
            INSERT INTO blood_analytics.donor_visits
            (id, donor_id, visit_date, birth_year, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(visit.donor_id.as_str())
        .bind(visit.visit_date)
        .bind(visit.birth_year)
        .bind(source_key)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn fetch_counts(pool: &PgPool, dataset: &str) -> anyhow::Result<Vec<DonationCountRecord>> {
    let rows = sqlx::query(
        "SELECT state, date, daily, total FROM blood_analytics.donation_counts \
         WHERE dataset = $1 ORDER BY date, state",
    )
    .bind(dataset)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| DonationCountRecord {
            state: row.get("state"),
            date: row.get("date"),
            daily: row.get("daily"),
            total: row.get("total"),
        })
        .collect())
}

pub async fn fetch_visits(pool: &PgPool) -> anyhow::Result<Vec<DonorVisit>> {
    let rows = sqlx::query(
        "SELECT donor_id, visit_date, birth_year FROM blood_analytics.donor_visits ORDER BY seq",
    )
    .fetch_all(pool)
    .await?;

    let mut visits = Vec::with_capacity(rows.len());
    for row in rows {
        let donor_id: String = row.get("donor_id");
        visits.push(DonorVisit {
            donor_id: DonorId::new(donor_id),
            visit_date: row.get("visit_date"),
            birth_year: row.get("birth_year"),
        });
    }

    Ok(visits)
}
