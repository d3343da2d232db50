//! `PgJobQueue`: the Job Queue port (spec.md §4.3) backed by the
//! `opcheck.jobs` table. The exclusive claim is the teacher's CTE +
//! `FOR UPDATE SKIP LOCKED` idiom from `ob-workflow::listener::TaskQueueListener::process_one`
//! and `sem_os_postgres::store::PgOutboxStore::claim_next`, adapted from "claim
//! the oldest unclaimed event" to "claim the oldest pending job".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opcheck_types::domain::{EnqueueOutcome, Job, JobStatus, ScreeningInput};
use opcheck_types::error::{Result, ScreeningError};
use opcheck_types::ports::JobQueue;
use opcheck_types::EntityFingerprint;
use sqlx::PgPool;
use uuid::Uuid;

fn db_err(e: sqlx::Error) -> ScreeningError {
    ScreeningError::StoreUnavailable(e.to_string())
}

pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(
        &self,
        fp: EntityFingerprint,
        input: &ScreeningInput,
        force_rescreen: bool,
        refresh_run_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome> {
        // `force_rescreen` callers (the Refresh Coordinator) enqueue
        // precisely because a valid row already exists and needs
        // re-checking against updated watchlist data, so the evidence
        // validity check is skipped for them (spec.md §4.7 — "in this path
        // force=true, so Reused is rare"). Both tables share one pool, so
        // this stays a plain query rather than a cross-store port call.
        if !force_rescreen {
            let valid = sqlx::query_scalar::<_, bool>(
                r#"SELECT EXISTS(SELECT 1 FROM opcheck.evidence WHERE fingerprint = $1 AND valid_until > $2)"#,
            )
            .bind(fp.to_hex())
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            if valid {
                return Ok(EnqueueOutcome::Reused);
            }
        }

        // An existing {pending, running} job for this fingerprint is reused
        // rather than duplicated — the partial unique index on
        // (fingerprint) WHERE status IN ('pending','running') is the
        // authority here; this SELECT is just the fast path that avoids a
        // round trip through a failed insert.
        let existing = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT job_id, status FROM opcheck.jobs
            WHERE fingerprint = $1 AND status IN ('pending', 'running')
            LIMIT 1
            "#,
        )
        .bind(fp.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        if let Some((existing_job_id, _status)) = existing {
            return Ok(EnqueueOutcome::AlreadyPending {
                job_id: existing_job_id,
            });
        }

        let job_id = Uuid::new_v4();
        let inserted = sqlx::query(
            r#"
            INSERT INTO opcheck.jobs (
                job_id, fingerprint, name, dob, entity_type, requestor, reason,
                business_reference, refresh_run_id, force_rescreen, status, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11
            )
            "#,
        )
        .bind(job_id)
        .bind(fp.to_hex())
        .bind(&input.name)
        .bind(input.dob.to_normalized_string())
        .bind(input.entity_type.as_str())
        .bind(&input.requestor)
        .bind(input.reason.as_str())
        .bind(&input.business_reference)
        .bind(refresh_run_id)
        .bind(force_rescreen)
        .bind(now)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(EnqueueOutcome::Queued { job_id }),
            // Another caller won the race against the partial unique index;
            // the job it created is just as good as the one we wanted.
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                let winner = sqlx::query_as::<_, (Uuid,)>(
                    r#"
                    SELECT job_id FROM opcheck.jobs
                    WHERE fingerprint = $1 AND status IN ('pending', 'running')
                    LIMIT 1
                    "#,
                )
                .bind(fp.to_hex())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
                let job_id = winner.map(|(id,)| id).unwrap_or(job_id);
                Ok(EnqueueOutcome::AlreadyPending { job_id })
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn claim_one(&self, now: DateTime<Utc>) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, Job>(
            r#"
            WITH next AS (
                SELECT job_id
                FROM opcheck.jobs
                WHERE status = 'pending'
                ORDER BY created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            UPDATE opcheck.jobs j
            SET status = 'running', started_at = $1
            FROM next
            WHERE j.job_id = next.job_id
            RETURNING j.*
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row)
    }

    async fn complete(&self, job_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE opcheck.jobs
            SET status = 'completed', finished_at = $2
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error_message: &str, now: DateTime<Utc>) -> Result<()> {
        let truncated: String = error_message.chars().take(500).collect();
        sqlx::query(
            r#"
            UPDATE opcheck.jobs
            SET status = 'failed', finished_at = $2, error_message = $3
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .bind(now)
        .bind(truncated)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn status(&self, job_id: Uuid) -> Result<Option<(JobStatus, Job)>> {
        let job = sqlx::query_as::<_, Job>(r#"SELECT * FROM opcheck.jobs WHERE job_id = $1"#)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(job.map(|j| (j.status, j)))
    }

    async fn purge_terminal_older_than(&self, days: u32, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - chrono::Duration::days(days as i64);
        let outcome = sqlx::query(
            r#"
            DELETE FROM opcheck.jobs
            WHERE status IN ('completed', 'failed') AND finished_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(outcome.rows_affected())
    }

    async fn pending_plus_running(&self) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT count(*) FROM opcheck.jobs
            WHERE status IN ('pending', 'running')
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(count as u64)
    }
}
