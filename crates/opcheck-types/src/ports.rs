//! Storage and collaborator port traits (spec.md §4.2–§4.5, §4.10), shared
//! by every crate in the workspace. Living here rather than in the root
//! crate is what breaks the dependency cycle: `opcheck-matcher` implements
//! `Matcher` and `opcheck-postgres` implements `EvidenceStore`/`JobQueue`/
//! `AuditSink`/`FallibleAuditSink` without either depending on the root
//! `opcheck` binary crate — the same split the teacher draws between
//! `sem_os_core::ports` and `sem_os_postgres`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    DecisionRecord, EnqueueOutcome, EvidenceRow, Job, JobStatus, ReviewOutcome, ScreeningInput,
};
use crate::error::Result;
use crate::EntityFingerprint;

/// Durable, ordered mapping from fingerprint to latest evidence row
/// (spec.md §4.2). Every write is atomic and single-statement; no partial
/// update is ever visible to a concurrent reader.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Returns a row only if present **and** currently valid. Never mutates
    /// `valid_until`.
    async fn get_valid(
        &self,
        fp: EntityFingerprint,
        now: DateTime<Utc>,
    ) -> Result<Option<EvidenceRow>>;

    /// Returns the row regardless of validity.
    async fn get(&self, fp: EntityFingerprint) -> Result<Option<EvidenceRow>>;

    /// Atomic upsert. `force_rescreen` controls whether review fields are
    /// preserved (routine refresh) or reset (per spec.md §4.2/§4.8).
    async fn upsert(
        &self,
        fp: EntityFingerprint,
        input: &ScreeningInput,
        decision: &DecisionRecord,
        force_rescreen: bool,
        now: DateTime<Utc>,
    ) -> Result<EvidenceRow>;

    async fn search_by_name(&self, substring: &str, limit: i64) -> Result<Vec<EvidenceRow>>;

    async fn search_by_fp(&self, fp: EntityFingerprint) -> Result<Option<EvidenceRow>>;

    /// Requires non-empty `reason`. Never changes decision fields; records
    /// an override flag visible to callers. Never extends `valid_until`
    /// (spec.md §9 — validity extension on false-positive is unspecified in
    /// the source and explicitly not implemented here).
    async fn mark_false_positive(
        &self,
        fp: EntityFingerprint,
        reason: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<EvidenceRow>;

    async fn claim_review(
        &self,
        fp: EntityFingerprint,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<EvidenceRow>;

    async fn complete_review(
        &self,
        fp: EntityFingerprint,
        actor: &str,
        outcome: ReviewOutcome,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<EvidenceRow>;

    /// Removes rows whose `last_screened_at` precedes `now - months`.
    /// Returns the number of rows removed.
    async fn purge_older_than(&self, months: u32, now: DateTime<Utc>) -> Result<u64>;
}

/// Durable FIFO of screening jobs with at-most-one concurrent claim per
/// fingerprint (spec.md §4.3).
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(
        &self,
        fp: EntityFingerprint,
        input: &ScreeningInput,
        force_rescreen: bool,
        refresh_run_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome>;

    /// Atomic claim of the oldest pending job, skipping rows locked by
    /// other claimers. Returns `None` if no pending job is available.
    async fn claim_one(&self, now: DateTime<Utc>) -> Result<Option<Job>>;

    async fn complete(&self, job_id: Uuid, now: DateTime<Utc>) -> Result<()>;

    /// `error_message` is truncated to 500 chars by the caller before being
    /// passed here (spec.md §7).
    async fn fail(&self, job_id: Uuid, error_message: &str, now: DateTime<Utc>) -> Result<()>;

    /// Joins with the Evidence Store by fingerprint when `completed` to
    /// include the result blob, per spec.md §4.3 (the join itself is the
    /// caller's responsibility — this returns the job status only).
    async fn status(&self, job_id: Uuid) -> Result<Option<(JobStatus, Job)>>;

    async fn purge_terminal_older_than(&self, days: u32, now: DateTime<Utc>) -> Result<u64>;

    /// Global count of jobs in `{pending, running}` across all fingerprints —
    /// the sizing signal the Dispatcher uses to decide between synchronous
    /// execution and enqueueing (spec.md §4.4 step 5). This models system
    /// load, not per-entity inflight work: `jobs_one_active_per_fingerprint_idx`
    /// already caps a single fingerprint at one active job, so a per-
    /// fingerprint count could never reach `SyncThreshold`.
    async fn pending_plus_running(&self) -> Result<u64>;
}

/// The Matcher collaborator (spec.md §4.5): deterministic, free of I/O side
/// effects given a fixed snapshot. Implemented by `opcheck-matcher`.
#[async_trait]
pub trait Matcher: Send + Sync {
    async fn decide(
        &self,
        input: &ScreeningInput,
        deadline: std::time::Duration,
    ) -> Result<DecisionRecord>;
}

/// Append-only structured event log (spec.md §4.10). Delivery is
/// best-effort: implementations log-and-continue on failure rather than
/// propagate, mirroring the teacher's `OutboxDispatcher` error handling.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Implemented by storage-backed sinks that can actually fail (e.g. a
/// Postgres insert). `opcheck-postgres` implements this; the root crate's
/// `audit::BestEffort` decorator adapts it into the infallible `AuditSink`.
#[async_trait]
pub trait FallibleAuditSink {
    async fn try_record(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// One audit event. `correlation_id` links a worker-completed job back to
/// the request (or refresh run) that originated it.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: &'static str,
    pub fingerprint: Option<EntityFingerprint>,
    pub business_reference: Option<String>,
    pub reason: Option<String>,
    pub outcome: String,
    pub correlation_id: Uuid,
    pub extra: crate::domain::AuditExtra,
}
