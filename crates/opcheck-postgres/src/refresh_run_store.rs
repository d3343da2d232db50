//! `PgRefreshRunStore`: persistence for Refresh Coordinator runs (spec.md
//! §4.7) and the candidate-enumeration query the RC drives its enqueue loop
//! from. Not one of the shared `opcheck_types::ports` traits — there is
//! exactly one refresh coordinator and it is always Postgres-backed (there
//! is no inline-mode refresh), so this is a concrete struct the way the
//! teacher's `PgCleanupStore`/`PgAuthoringStore` are: single-purpose,
//! constructed directly from a pool rather than behind a trait object.

use chrono::{DateTime, Utc};
use opcheck_types::domain::RefreshRun;
use opcheck_types::error::{Result, ScreeningError};
use opcheck_types::EntityFingerprint;
use sqlx::PgPool;
use uuid::Uuid;

fn db_err(e: sqlx::Error) -> ScreeningError {
    ScreeningError::StoreUnavailable(e.to_string())
}

pub struct PgRefreshRunStore {
    pool: PgPool,
}

impl PgRefreshRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The UK hash recorded by the most recent run, if any — the baseline
    /// the next run diffs against.
    pub async fn latest_uk_hash(&self) -> Result<Option<String>> {
        let hash = sqlx::query_scalar::<_, String>(
            r#"SELECT uk_hash FROM opcheck.refresh_runs ORDER BY ran_at DESC LIMIT 1"#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(hash)
    }

    pub async fn record(&self, run: &RefreshRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO opcheck.refresh_runs (
                run_id, ran_at, uk_hash, prev_uk_hash, uk_row_count,
                delta_added, delta_removed, delta_changed, candidate_count,
                queued_count, reused_count, already_pending_count, failed_count
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(run.run_id)
        .bind(run.ran_at)
        .bind(&run.uk_hash)
        .bind(&run.prev_uk_hash)
        .bind(run.uk_row_count)
        .bind(run.delta_added)
        .bind(run.delta_removed)
        .bind(run.delta_changed)
        .bind(run.candidate_count)
        .bind(run.queued_count)
        .bind(run.reused_count)
        .bind(run.already_pending_count)
        .bind(run.failed_count)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn get(&self, run_id: Uuid) -> Result<Option<RefreshRun>> {
        let run = sqlx::query_as::<_, RefreshRun>(
            r#"SELECT * FROM opcheck.refresh_runs WHERE run_id = $1"#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(run)
    }

    /// Candidate fingerprints for a refresh run: every currently-valid
    /// evidence row screened within the last 12 months (spec.md §4.7's
    /// "implemented as all currently-valid rows" fallback — a conservative
    /// superset of the more precise row-identity/name-prefix heuristic,
    /// chosen because the watchlist ingestion pipeline that would supply
    /// precise row identities is out of scope here, spec.md §1).
    pub async fn candidates_since(&self, since: DateTime<Utc>) -> Result<Vec<EntityFingerprint>> {
        let hexes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT fingerprint FROM opcheck.evidence
            WHERE last_screened_at >= $1
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        hexes
            .into_iter()
            .map(|h| h.parse().map_err(|e| ScreeningError::StoreUnavailable(format!("{e}"))))
            .collect()
    }
}
