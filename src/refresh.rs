//! Refresh Coordinator (spec.md §4.7): diffs a newly-materialized watchlist
//! snapshot's UK hash against the previously recorded one and, if changed,
//! force-rescreens every currently-valid candidate. There is exactly one
//! refresh coordinator and it is always Postgres-backed (no inline-mode
//! refresh), mirroring the single-purpose, concretely-typed
//! `PgCleanupStore`/`PgAuthoringStore` pattern rather than a port trait.
//!
//! Watchlist ingestion itself (materializing the snapshot, computing the UK
//! hash and row-identity delta) is out of scope (spec.md §1) — `run` takes
//! the hash, row count, and delta as already-computed inputs from whatever
//! process produced the new snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use opcheck_postgres::refresh_run_store::PgRefreshRunStore;
use opcheck_types::domain::{DobQuery, EnqueueOutcome, RefreshRun, ScreeningInput};
use opcheck_types::reason::ReasonForCheck;
use opcheck_types::wire::RefreshDelta;
use opcheck_types::EntityFingerprint;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, ScreeningError};
use crate::ports::{AuditEvent, AuditSink, EvidenceStore, JobQueue};

/// Candidate enumeration window — "within the last 12 months" (spec.md
/// §4.7 step 2).
const CANDIDATE_WINDOW_DAYS: i64 = 365;

pub struct RescreenSummary {
    pub candidates: i64,
    pub queued: i64,
    pub already_pending: i64,
    pub reused: i64,
    pub failed: i64,
}

pub struct RefreshOutcome {
    pub run: RefreshRun,
    pub uk_changed: bool,
    pub rescreen: RescreenSummary,
}

pub struct RefreshCoordinator {
    es: Arc<dyn EvidenceStore>,
    jq: Arc<dyn JobQueue>,
    run_store: Arc<PgRefreshRunStore>,
    audit: Arc<dyn AuditSink>,
    running: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(
        es: Arc<dyn EvidenceStore>,
        jq: Arc<dyn JobQueue>,
        run_store: Arc<PgRefreshRunStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            es,
            jq,
            run_store,
            audit,
            running: Mutex::new(()),
        }
    }

    /// Runs one refresh cycle. Rejects a concurrent call rather than
    /// blocking on it — spec.md §4.7's "concurrent RC runs are serialized"
    /// is satisfied here by refusing the second caller outright, since a
    /// queued-up second run would just repeat the same hash comparison.
    pub async fn run(
        &self,
        uk_hash: String,
        uk_row_count: i64,
        delta: RefreshDelta,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| ScreeningError::Conflict("refresh already in progress".into()))?;

        let prev_hash = self.run_store.latest_uk_hash().await?;
        let uk_changed = prev_hash.as_deref() != Some(uk_hash.as_str());

        if !uk_changed {
            let run = RefreshRun {
                run_id: Uuid::new_v4(),
                ran_at: now,
                uk_hash,
                prev_uk_hash: prev_hash,
                uk_row_count,
                delta_added: 0,
                delta_removed: 0,
                delta_changed: 0,
                candidate_count: 0,
                queued_count: 0,
                reused_count: 0,
                already_pending_count: 0,
                failed_count: 0,
            };
            self.run_store.record(&run).await?;
            return Ok(RefreshOutcome {
                run,
                uk_changed: false,
                rescreen: RescreenSummary {
                    candidates: 0,
                    queued: 0,
                    already_pending: 0,
                    reused: 0,
                    failed: 0,
                },
            });
        }

        let run_id = Uuid::new_v4();
        let since = now - chrono::Duration::days(CANDIDATE_WINDOW_DAYS);
        let candidates = self.run_store.candidates_since(since).await?;

        let mut queued = 0i64;
        let mut reused = 0i64;
        let mut already_pending = 0i64;
        let mut failed = 0i64;

        for fp in &candidates {
            match self.rescreen_candidate(*fp, run_id, now).await {
                Ok(EnqueueOutcome::Queued { .. }) => queued += 1,
                Ok(EnqueueOutcome::Reused) => reused += 1,
                Ok(EnqueueOutcome::AlreadyPending { .. }) => already_pending += 1,
                Err(e) => {
                    failed += 1;
                    warn!(fingerprint = %fp.to_hex(), error = %e, "refresh candidate rescreen failed");
                }
            }
        }

        let run = RefreshRun {
            run_id,
            ran_at: now,
            uk_hash,
            prev_uk_hash: prev_hash,
            uk_row_count,
            delta_added: delta.added,
            delta_removed: delta.removed,
            delta_changed: delta.changed,
            candidate_count: candidates.len() as i64,
            queued_count: queued,
            reused_count: reused,
            already_pending_count: already_pending,
            failed_count: failed,
        };
        self.run_store.record(&run).await?;

        self.audit
            .record(AuditEvent {
                at: now,
                actor: "refresh-coordinator".to_string(),
                action: "refresh_run",
                fingerprint: None,
                business_reference: None,
                reason: None,
                outcome: format!(
                    "queued={queued} already_pending={already_pending} reused={reused} failed={failed}"
                ),
                correlation_id: run_id,
                extra: Default::default(),
            })
            .await;

        Ok(RefreshOutcome {
            run,
            uk_changed: true,
            rescreen: RescreenSummary {
                candidates: candidates.len() as i64,
                queued,
                already_pending,
                reused,
                failed,
            },
        })
    }

    async fn rescreen_candidate(
        &self,
        fp: EntityFingerprint,
        run_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome> {
        let Some(row) = self.es.get(fp).await? else {
            return Err(ScreeningError::NotFound(fp.to_hex()));
        };

        let input = ScreeningInput {
            name: row.display_name,
            dob: row.date_of_birth.map(DobQuery::Full).unwrap_or(DobQuery::None),
            entity_type: row.entity_type,
            requestor: "refresh-coordinator".to_string(),
            reason: ReasonForCheck::PeriodicReScreen,
            business_reference: format!("refresh-run:{run_id}"),
            search_backend: None,
        };

        self.jq.enqueue(fp, &input, true, Some(run_id), now).await
    }
}
