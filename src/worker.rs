//! Worker (spec.md §4.6): claims pending jobs and drives them to
//! completion. Poll/claim/process/shutdown shape is the teacher's
//! `TaskQueueListener::run`/`OutboxDispatcher::run`, generalized from
//! "drain an event queue" to "drain a screening job queue" with an added
//! periodic retention sweep (§4.6 step 5).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use opcheck_types::domain::ScreeningInput;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::ports::{AuditEvent, AuditSink, EvidenceStore, JobQueue, Matcher};

/// Backoff after a claim/process error, before retrying — the teacher's
/// `ERROR_BACKOFF_MS` generalized to a `Duration` constant.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct Worker {
    es: Arc<dyn EvidenceStore>,
    jq: Arc<dyn JobQueue>,
    matcher: Arc<dyn Matcher>,
    audit: Arc<dyn AuditSink>,
    config: Config,
}

impl Worker {
    pub fn new(
        es: Arc<dyn EvidenceStore>,
        jq: Arc<dyn JobQueue>,
        matcher: Arc<dyn Matcher>,
        audit: Arc<dyn AuditSink>,
        config: Config,
    ) -> Self {
        Self {
            es,
            jq,
            matcher,
            audit,
            config,
        }
    }

    /// Runs until `shutdown` reports `true`. Spawn as a background task.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(poll = ?self.config.worker_poll, "worker started");
        let mut loops: u64 = 0;

        loop {
            if *shutdown.borrow() {
                info!("worker shutting down");
                break;
            }

            match self.process_one(Utc::now()).await {
                Ok(true) => {
                    loops += 1;
                    if loops % self.config.cleanup_every_n_loops == 0 {
                        self.cleanup(Utc::now()).await;
                    }
                    continue;
                }
                Ok(false) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.worker_poll) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                info!("worker shutting down");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "worker cycle failed");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Claims and processes one job. Returns `Ok(false)` when the queue was
    /// empty — the caller's signal to sleep rather than re-poll immediately.
    async fn process_one(&self, now: chrono::DateTime<Utc>) -> Result<bool> {
        let Some(job) = self.jq.claim_one(now).await? else {
            return Ok(false);
        };

        if !job.force_rescreen {
            if let Some(row) = self.es.get_valid(job.fingerprint, now).await? {
                self.jq.complete(job.job_id, now).await?;
                self.record_audit(
                    &job.requestor,
                    Some(job.fingerprint),
                    &job.business_reference,
                    job.reason.as_str(),
                    "reused_by_worker",
                    job.job_id,
                )
                .await;
                debug!(job_id = %job.job_id, status = row.status.as_str(), "reused by worker");
                return Ok(true);
            }
        }

        let input = ScreeningInput {
            name: job.name.clone(),
            dob: job.dob,
            entity_type: job.entity_type,
            requestor: job.requestor.clone(),
            reason: job.reason,
            business_reference: job.business_reference.clone(),
            search_backend: None,
        };

        let decision = match self.matcher.decide(&input, self.config.matcher_deadline).await {
            Ok(decision) => decision,
            Err(e) => {
                let message = e.to_string();
                self.jq.fail(job.job_id, &message, now).await?;
                self.record_audit(
                    &job.requestor,
                    Some(job.fingerprint),
                    &job.business_reference,
                    job.reason.as_str(),
                    "failed",
                    job.job_id,
                )
                .await;
                warn!(job_id = %job.job_id, error = %message, "matcher failed job");
                return Ok(true);
            }
        };

        let previous_status = self.es.get(job.fingerprint).await?.map(|r| r.status);

        match self
            .es
            .upsert(job.fingerprint, &input, &decision, job.force_rescreen, now)
            .await
        {
            Ok(row) => {
                self.jq.complete(job.job_id, now).await?;
                let transition = format!(
                    "{}->{}",
                    previous_status.map(|s| s.as_str()).unwrap_or("none"),
                    row.status.as_str()
                );
                self.record_audit(
                    &job.requestor,
                    Some(job.fingerprint),
                    &job.business_reference,
                    job.reason.as_str(),
                    &transition,
                    job.job_id,
                )
                .await;
                Ok(true)
            }
            Err(e) => {
                let message = e.to_string();
                self.jq.fail(job.job_id, &message, now).await?;
                self.record_audit(
                    &job.requestor,
                    Some(job.fingerprint),
                    &job.business_reference,
                    job.reason.as_str(),
                    "failed",
                    job.job_id,
                )
                .await;
                warn!(job_id = %job.job_id, error = %message, "evidence upsert failed job");
                Ok(true)
            }
        }
    }

    async fn cleanup(&self, now: chrono::DateTime<Utc>) {
        match self
            .jq
            .purge_terminal_older_than(self.config.job_retention_days, now)
            .await
        {
            Ok(n) => debug!(purged = n, "job retention sweep"),
            Err(e) => error!(error = %e, "job retention sweep failed"),
        }

        if let Some(months) = self.config.evidence_retention_months {
            match self.es.purge_older_than(months, now).await {
                Ok(n) => debug!(purged = n, "evidence retention sweep"),
                Err(e) => error!(error = %e, "evidence retention sweep failed"),
            }
        }
    }

    async fn record_audit(
        &self,
        actor: &str,
        fp: Option<opcheck_types::EntityFingerprint>,
        business_reference: &str,
        reason: &str,
        outcome: &str,
        correlation_id: uuid::Uuid,
    ) {
        self.audit
            .record(AuditEvent {
                at: Utc::now(),
                actor: actor.to_string(),
                action: "worker_process",
                fingerprint: fp,
                business_reference: Some(business_reference.to_string()),
                reason: Some(reason.to_string()),
                outcome: outcome.to_string(),
                correlation_id,
                extra: Default::default(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use opcheck_types::domain::{
        Confidence, DecisionRecord, DobQuery, EntityType, EnqueueOutcome, EvidenceRow, Job,
        JobStatus, ResultBlob, ReviewOutcome, ReviewState, RiskLevel, ScreeningStatus,
    };
    use opcheck_types::reason::ReasonForCheck;
    use parking_lot::Mutex;
    use uuid::Uuid;

    struct NullAudit;
    #[async_trait]
    impl AuditSink for NullAudit {
        async fn record(&self, _event: AuditEvent) {}
    }

    fn job_fixture(fp: opcheck_types::EntityFingerprint, force_rescreen: bool) -> Job {
        Job {
            job_id: Uuid::new_v4(),
            fingerprint: fp,
            name: "Jane Doe".into(),
            dob: DobQuery::None,
            entity_type: EntityType::Person,
            requestor: "u1".into(),
            reason: ReasonForCheck::ClientOnboarding,
            business_reference: "CASE-1".into(),
            refresh_run_id: None,
            force_rescreen,
            status: JobStatus::Running,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            finished_at: None,
            error_message: None,
        }
    }

    fn cleared_decision() -> DecisionRecord {
        DecisionRecord {
            status: ScreeningStatus::Cleared,
            risk_level: RiskLevel::Cleared,
            confidence: Confidence::VeryHigh,
            score: rust_decimal::Decimal::ZERO,
            uk_sanctions_flag: false,
            pep_flag: false,
            matched_subject: None,
            matched_dob: None,
            matched_regime: None,
            sources: vec![],
            top_matches: vec![],
        }
    }

    fn row_from(fp: opcheck_types::EntityFingerprint, decision: &DecisionRecord, now: DateTime<Utc>) -> EvidenceRow {
        EvidenceRow {
            fingerprint: fp,
            display_name: "Jane Doe".into(),
            normalized_name: "jane doe".into(),
            date_of_birth: None,
            entity_type: EntityType::Person,
            last_screened_at: now,
            valid_until: now + chrono::Duration::days(365),
            status: decision.status,
            risk_level: decision.risk_level,
            confidence: decision.confidence,
            score: decision.score,
            uk_sanctions_flag: decision.uk_sanctions_flag,
            pep_flag: decision.pep_flag,
            result_blob: ResultBlob {
                matched_subject: None,
                matched_dob: None,
                regime: None,
                position: None,
                topics: vec![],
                sources: vec![],
                top_matches: vec![],
                match_found: decision.match_found(),
                check_summary_status: decision.status,
                check_summary_source: "worker".into(),
                check_summary_date: now,
            },
            last_requestor: "u1".into(),
            updated_at: now,
            review_state: ReviewState::Unreviewed,
            review_outcome: None,
            review_notes: None,
            review_claimed_by: None,
            review_claimed_at: None,
            review_completed_by: None,
            review_completed_at: None,
            false_positive_reason: None,
            false_positive_override: false,
        }
    }

    struct FakeEs {
        valid: Mutex<Option<EvidenceRow>>,
        upserts: Mutex<u32>,
    }

    #[async_trait]
    impl EvidenceStore for FakeEs {
        async fn get_valid(
            &self,
            _fp: opcheck_types::EntityFingerprint,
            _now: DateTime<Utc>,
        ) -> Result<Option<EvidenceRow>> {
            Ok(self.valid.lock().clone())
        }
        async fn get(&self, _fp: opcheck_types::EntityFingerprint) -> Result<Option<EvidenceRow>> {
            Ok(self.valid.lock().clone())
        }
        async fn upsert(
            &self,
            fp: opcheck_types::EntityFingerprint,
            _input: &ScreeningInput,
            decision: &DecisionRecord,
            _force_rescreen: bool,
            now: DateTime<Utc>,
        ) -> Result<EvidenceRow> {
            *self.upserts.lock() += 1;
            let row = row_from(fp, decision, now);
            *self.valid.lock() = Some(row.clone());
            Ok(row)
        }
        async fn search_by_name(&self, _s: &str, _limit: i64) -> Result<Vec<EvidenceRow>> {
            Ok(vec![])
        }
        async fn search_by_fp(&self, fp: opcheck_types::EntityFingerprint) -> Result<Option<EvidenceRow>> {
            self.get(fp).await
        }
        async fn mark_false_positive(
            &self,
            _fp: opcheck_types::EntityFingerprint,
            _reason: &str,
            _actor: &str,
            _now: DateTime<Utc>,
        ) -> Result<EvidenceRow> {
            unimplemented!()
        }
        async fn claim_review(
            &self,
            _fp: opcheck_types::EntityFingerprint,
            _actor: &str,
            _now: DateTime<Utc>,
        ) -> Result<EvidenceRow> {
            unimplemented!()
        }
        async fn complete_review(
            &self,
            _fp: opcheck_types::EntityFingerprint,
            _actor: &str,
            _outcome: ReviewOutcome,
            _notes: &str,
            _now: DateTime<Utc>,
        ) -> Result<EvidenceRow> {
            unimplemented!()
        }
        async fn purge_older_than(&self, _months: u32, _now: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
    }

    struct FakeJq {
        queued: Mutex<Vec<Job>>,
        completed: Mutex<Vec<Uuid>>,
        failed: Mutex<Vec<(Uuid, String)>>,
    }

    #[async_trait]
    impl JobQueue for FakeJq {
        async fn enqueue(
            &self,
            _fp: opcheck_types::EntityFingerprint,
            _input: &ScreeningInput,
            _force_rescreen: bool,
            _refresh_run_id: Option<Uuid>,
            _now: DateTime<Utc>,
        ) -> Result<EnqueueOutcome> {
            unimplemented!()
        }
        async fn claim_one(&self, _now: DateTime<Utc>) -> Result<Option<Job>> {
            Ok(self.queued.lock().pop())
        }
        async fn complete(&self, job_id: Uuid, _now: DateTime<Utc>) -> Result<()> {
            self.completed.lock().push(job_id);
            Ok(())
        }
        async fn fail(&self, job_id: Uuid, error_message: &str, _now: DateTime<Utc>) -> Result<()> {
            self.failed.lock().push((job_id, error_message.to_string()));
            Ok(())
        }
        async fn status(&self, _job_id: Uuid) -> Result<Option<(JobStatus, Job)>> {
            Ok(None)
        }
        async fn purge_terminal_older_than(&self, _days: u32, _now: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
        async fn pending_plus_running(&self) -> Result<u64> {
            Ok(0)
        }
    }

    struct StubMatcher {
        decision: DecisionRecord,
    }
    #[async_trait]
    impl Matcher for StubMatcher {
        async fn decide(&self, _input: &ScreeningInput, _deadline: Duration) -> Result<DecisionRecord> {
            Ok(self.decision.clone())
        }
    }

    fn fp() -> opcheck_types::EntityFingerprint {
        opcheck_types::EntityFingerprint::from_bytes([7u8; 32])
    }

    #[tokio::test]
    async fn idempotency_recheck_reuses_existing_valid_row_without_calling_matcher() {
        let existing = row_from(fp(), &cleared_decision(), Utc::now());
        let es = Arc::new(FakeEs {
            valid: Mutex::new(Some(existing)),
            upserts: Mutex::new(0),
        });
        let job = job_fixture(fp(), false);
        let job_id = job.job_id;
        let jq = Arc::new(FakeJq {
            queued: Mutex::new(vec![job]),
            completed: Mutex::new(vec![]),
            failed: Mutex::new(vec![]),
        });
        let worker = Worker::new(
            es.clone(),
            jq.clone(),
            Arc::new(StubMatcher {
                decision: cleared_decision(),
            }),
            Arc::new(NullAudit),
            Config::from_env(),
        );
        let processed = worker.process_one(Utc::now()).await.unwrap();
        assert!(processed);
        assert_eq!(*es.upserts.lock(), 0);
        assert_eq!(jq.completed.lock().as_slice(), &[job_id]);
    }

    #[tokio::test]
    async fn force_rescreen_bypasses_idempotency_cache() {
        let existing = row_from(fp(), &cleared_decision(), Utc::now());
        let es = Arc::new(FakeEs {
            valid: Mutex::new(Some(existing)),
            upserts: Mutex::new(0),
        });
        let job = job_fixture(fp(), true);
        let jq = Arc::new(FakeJq {
            queued: Mutex::new(vec![job]),
            completed: Mutex::new(vec![]),
            failed: Mutex::new(vec![]),
        });
        let worker = Worker::new(
            es.clone(),
            jq.clone(),
            Arc::new(StubMatcher {
                decision: cleared_decision(),
            }),
            Arc::new(NullAudit),
            Config::from_env(),
        );
        worker.process_one(Utc::now()).await.unwrap();
        assert_eq!(*es.upserts.lock(), 1);
        assert_eq!(jq.completed.lock().len(), 1);
    }

    #[tokio::test]
    async fn empty_queue_returns_false() {
        let es = Arc::new(FakeEs {
            valid: Mutex::new(None),
            upserts: Mutex::new(0),
        });
        let jq = Arc::new(FakeJq {
            queued: Mutex::new(vec![]),
            completed: Mutex::new(vec![]),
            failed: Mutex::new(vec![]),
        });
        let worker = Worker::new(
            es,
            jq,
            Arc::new(StubMatcher {
                decision: cleared_decision(),
            }),
            Arc::new(NullAudit),
            Config::from_env(),
        );
        assert!(!worker.process_one(Utc::now()).await.unwrap());
    }
}
