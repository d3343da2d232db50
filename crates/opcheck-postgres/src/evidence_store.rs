//! `PgEvidenceStore`: the Evidence Store port (spec.md §4.2) backed by the
//! `opcheck.evidence` table. Grounded on the teacher's `PgEvidenceStore`/
//! `PgOutboxStore` in `sem_os_postgres::store` — `pool: PgPool` field, plain
//! `sqlx::query`/`query_as` (not the `query!` macros, since this schema may
//! not exist at the caller's compile time), `anyhow`-wrapped errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opcheck_types::domain::{EvidenceRow, ReviewOutcome, ScreeningInput};
use opcheck_types::error::{Result, ScreeningError};
use opcheck_types::ports::EvidenceStore;
use opcheck_types::EntityFingerprint;
use sqlx::PgPool;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Same fold as the EKD's `normalize_name`; duplicated here rather than
/// shared with the root crate to avoid a dependency back onto it (the same
/// tradeoff `opcheck-matcher` makes for its own name normalization).
fn normalize_name(name: &str) -> String {
    let folded: String = name.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let stripped: String = folded
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn db_err(e: sqlx::Error) -> ScreeningError {
    ScreeningError::StoreUnavailable(e.to_string())
}

pub struct PgEvidenceStore {
    pool: PgPool,
    validity_days: i64,
}

impl PgEvidenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            validity_days: 365,
        }
    }

    /// Overrides the default 365-day validity window with `ValidityDays`
    /// (spec.md §6) from the running configuration.
    pub fn with_validity_days(mut self, validity_days: i64) -> Self {
        self.validity_days = validity_days;
        self
    }
}

#[async_trait]
impl EvidenceStore for PgEvidenceStore {
    async fn get_valid(
        &self,
        fp: EntityFingerprint,
        now: DateTime<Utc>,
    ) -> Result<Option<EvidenceRow>> {
        let row = sqlx::query_as::<_, EvidenceRow>(
            r#"
            SELECT * FROM opcheck.evidence
            WHERE fingerprint = $1 AND valid_until > $2
            "#,
        )
        .bind(fp.to_hex())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row)
    }

    async fn get(&self, fp: EntityFingerprint) -> Result<Option<EvidenceRow>> {
        let row = sqlx::query_as::<_, EvidenceRow>(
            r#"SELECT * FROM opcheck.evidence WHERE fingerprint = $1"#,
        )
        .bind(fp.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row)
    }

    async fn upsert(
        &self,
        fp: EntityFingerprint,
        input: &ScreeningInput,
        decision: &opcheck_types::domain::DecisionRecord,
        force_rescreen: bool,
        now: DateTime<Utc>,
    ) -> Result<EvidenceRow> {
        let normalized_name = normalize_name(&input.name);
        let valid_until = now + chrono::Duration::days(self.validity_days);
        let result_blob = serde_json::to_value(opcheck_types::domain::ResultBlob {
            matched_subject: decision.matched_subject.clone(),
            matched_dob: decision.matched_dob,
            regime: decision.matched_regime,
            position: None,
            topics: vec![],
            sources: decision.sources.clone(),
            top_matches: decision.top_matches.clone(),
            match_found: decision.match_found(),
            check_summary_status: decision.status,
            check_summary_source: "queue".to_string(),
            check_summary_date: now,
        })
        .map_err(|e| ScreeningError::StoreUnavailable(e.to_string()))?;

        let row = sqlx::query_as::<_, EvidenceRow>(
            r#"
            INSERT INTO opcheck.evidence (
                fingerprint, display_name, normalized_name, date_of_birth, entity_type,
                last_screened_at, valid_until,
                status, risk_level, confidence, score, uk_sanctions_flag, pep_flag,
                result_blob, last_requestor, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7,
                $8, $9, $10, $11, $12, $13,
                $14, $15, $6
            )
            ON CONFLICT (fingerprint) DO UPDATE SET
                display_name      = EXCLUDED.display_name,
                normalized_name    = EXCLUDED.normalized_name,
                date_of_birth      = EXCLUDED.date_of_birth,
                entity_type        = EXCLUDED.entity_type,
                last_screened_at   = EXCLUDED.last_screened_at,
                valid_until        = EXCLUDED.valid_until,
                status             = EXCLUDED.status,
                risk_level         = EXCLUDED.risk_level,
                confidence         = EXCLUDED.confidence,
                score              = EXCLUDED.score,
                uk_sanctions_flag  = EXCLUDED.uk_sanctions_flag,
                pep_flag           = EXCLUDED.pep_flag,
                result_blob        = EXCLUDED.result_blob,
                last_requestor     = EXCLUDED.last_requestor,
                updated_at         = EXCLUDED.updated_at,
                review_state       = CASE WHEN $16 OR opcheck.evidence.status IS DISTINCT FROM EXCLUDED.status THEN 'UNREVIEWED' ELSE opcheck.evidence.review_state END,
                review_outcome     = CASE WHEN $16 OR opcheck.evidence.status IS DISTINCT FROM EXCLUDED.status THEN NULL ELSE opcheck.evidence.review_outcome END,
                review_notes       = CASE WHEN $16 OR opcheck.evidence.status IS DISTINCT FROM EXCLUDED.status THEN NULL ELSE opcheck.evidence.review_notes END,
                review_claimed_by  = CASE WHEN $16 OR opcheck.evidence.status IS DISTINCT FROM EXCLUDED.status THEN NULL ELSE opcheck.evidence.review_claimed_by END,
                review_claimed_at  = CASE WHEN $16 OR opcheck.evidence.status IS DISTINCT FROM EXCLUDED.status THEN NULL ELSE opcheck.evidence.review_claimed_at END,
                review_completed_by = CASE WHEN $16 OR opcheck.evidence.status IS DISTINCT FROM EXCLUDED.status THEN NULL ELSE opcheck.evidence.review_completed_by END,
                review_completed_at = CASE WHEN $16 OR opcheck.evidence.status IS DISTINCT FROM EXCLUDED.status THEN NULL ELSE opcheck.evidence.review_completed_at END,
                false_positive_reason = CASE WHEN $16 OR opcheck.evidence.status IS DISTINCT FROM EXCLUDED.status THEN NULL ELSE opcheck.evidence.false_positive_reason END,
                false_positive_override = CASE WHEN $16 OR opcheck.evidence.status IS DISTINCT FROM EXCLUDED.status THEN FALSE ELSE opcheck.evidence.false_positive_override END
            RETURNING *
            "#,
        )
        .bind(fp.to_hex())
        .bind(&input.name)
        .bind(&normalized_name)
        .bind(input.dob.as_full_date())
        .bind(input.entity_type.as_str())
        .bind(now)
        .bind(valid_until)
        .bind(decision.status.as_str())
        .bind(decision.risk_level.as_str())
        .bind(decision.confidence.as_str())
        .bind(decision.score)
        .bind(decision.uk_sanctions_flag)
        .bind(decision.pep_flag)
        .bind(result_blob)
        .bind(&input.requestor)
        .bind(force_rescreen)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row)
    }

    async fn search_by_name(&self, substring: &str, limit: i64) -> Result<Vec<EvidenceRow>> {
        let needle = normalize_name(substring);
        let rows = sqlx::query_as::<_, EvidenceRow>(
            r#"
            SELECT * FROM opcheck.evidence
            WHERE normalized_name LIKE '%' || $1 || '%'
            ORDER BY last_screened_at DESC
            LIMIT $2
            "#,
        )
        .bind(needle)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows)
    }

    async fn search_by_fp(&self, fp: EntityFingerprint) -> Result<Option<EvidenceRow>> {
        self.get(fp).await
    }

    async fn mark_false_positive(
        &self,
        fp: EntityFingerprint,
        reason: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<EvidenceRow> {
        if reason.trim().is_empty() {
            return Err(ScreeningError::invalid(
                "reason",
                "false-positive reason must not be empty",
            ));
        }
        // No extension of valid_until here: spec.md §9 leaves that
        // unspecified in the source and we do not implement it.
        let row = sqlx::query_as::<_, EvidenceRow>(
            r#"
            UPDATE opcheck.evidence
            SET false_positive_reason = $2,
                false_positive_override = TRUE,
                review_completed_by = $3,
                review_completed_at = $4,
                updated_at = $4
            WHERE fingerprint = $1
            RETURNING *
            "#,
        )
        .bind(fp.to_hex())
        .bind(reason)
        .bind(actor)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.ok_or_else(|| ScreeningError::NotFound(format!("evidence {} not found", fp.to_hex())))
    }

    async fn claim_review(
        &self,
        fp: EntityFingerprint,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<EvidenceRow> {
        let row = sqlx::query_as::<_, EvidenceRow>(
            r#"
            UPDATE opcheck.evidence
            SET review_state = 'IN_REVIEW',
                review_claimed_by = $2,
                review_claimed_at = $3,
                updated_at = $3
            WHERE fingerprint = $1 AND review_state = 'UNREVIEWED'
            RETURNING *
            "#,
        )
        .bind(fp.to_hex())
        .bind(actor)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.ok_or_else(|| {
            ScreeningError::Conflict(format!(
                "evidence {} is not in an unreviewed state",
                fp.to_hex()
            ))
        })
    }

    async fn complete_review(
        &self,
        fp: EntityFingerprint,
        actor: &str,
        outcome: ReviewOutcome,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<EvidenceRow> {
        if notes.trim().chars().count() < 10 {
            return Err(ScreeningError::invalid(
                "notes",
                "review notes must be at least 10 characters",
            ));
        }
        let row = sqlx::query_as::<_, EvidenceRow>(
            r#"
            UPDATE opcheck.evidence
            SET review_state = 'COMPLETED',
                review_outcome = $2,
                review_notes = $3,
                review_completed_by = $4,
                review_completed_at = $5,
                updated_at = $5
            WHERE fingerprint = $1 AND review_state = 'IN_REVIEW'
            RETURNING *
            "#,
        )
        .bind(fp.to_hex())
        .bind(outcome.as_str())
        .bind(notes)
        .bind(actor)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.ok_or_else(|| {
            ScreeningError::Conflict(format!(
                "evidence {} is not claimed for review",
                fp.to_hex()
            ))
        })
    }

    async fn purge_older_than(&self, months: u32, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - chrono::Duration::days(30 * months as i64);
        let outcome = sqlx::query(
            r#"DELETE FROM opcheck.evidence WHERE last_screened_at < $1"#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(outcome.rows_affected())
    }
}
