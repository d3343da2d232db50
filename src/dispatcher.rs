//! Dispatcher (spec.md §4.4): request-path logic. Validates, derives the
//! entity key, consults the Evidence Store and Job Queue, and chooses among
//! {return cached, run synchronously, enqueue}. Emits a structured
//! `tracing` span per request in addition to an audit event, following the
//! teacher's `tracing::info!`/`debug!` field style.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use opcheck_types::domain::{EntityType, EnqueueOutcome, EvidenceRow, ReviewState, ScreeningInput};
use opcheck_types::wire::ScreenRequest;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, ScreeningError};
use crate::fingerprint::{fingerprint, normalize_name, parse_dob_query};
use crate::ports::{AuditEvent, AuditSink, EvidenceStore, JobQueue, Matcher};

/// Outcome of `Dispatcher::screen`, transport-agnostic. The HTTP layer maps
/// this to status codes and the frozen wire body.
pub enum ScreenOutcome {
    /// `ES.get_valid` hit, or the synchronous path completed: an
    /// `EvidenceRow` (200).
    Evidence(EvidenceRow),
    /// Enqueued (or already enqueued) a background job (202).
    Enqueued {
        outcome: EnqueueOutcome,
        fingerprint: opcheck_types::EntityFingerprint,
    },
}

pub struct Dispatcher {
    store: Option<(Arc<dyn EvidenceStore>, Arc<dyn JobQueue>)>,
    matcher: Arc<dyn Matcher>,
    audit: Arc<dyn AuditSink>,
    config: Config,
}

impl Dispatcher {
    pub fn new(
        store: Option<(Arc<dyn EvidenceStore>, Arc<dyn JobQueue>)>,
        matcher: Arc<dyn Matcher>,
        audit: Arc<dyn AuditSink>,
        config: Config,
    ) -> Self {
        Self {
            store,
            matcher,
            audit,
            config,
        }
    }

    #[tracing::instrument(skip(self, req), fields(entity_fp, reason = %req.reason_for_check, outcome))]
    pub async fn screen(&self, req: ScreenRequest, now: DateTime<Utc>) -> Result<ScreenOutcome> {
        let correlation_id = Uuid::new_v4();

        if req.name.trim().is_empty() {
            return Err(ScreeningError::invalid("name", "name must not be empty"));
        }
        if req.requestor.trim().is_empty() {
            return Err(ScreeningError::invalid(
                "requestor",
                "requestor must not be empty",
            ));
        }
        if req.business_reference.trim().is_empty() {
            return Err(ScreeningError::invalid(
                "business_reference",
                "business_reference must not be empty",
            ));
        }

        let entity_type = req.entity_type.unwrap_or_default();
        let fp = fingerprint(&req.name, entity_type, req.dob.as_deref())?;
        tracing::Span::current().record("entity_fp", tracing::field::display(fp.to_hex()));

        let input = ScreeningInput {
            name: req.name.clone(),
            dob: parse_dob_query(req.dob.as_deref()),
            entity_type,
            requestor: req.requestor.clone(),
            reason: req.reason_for_check,
            business_reference: req.business_reference.clone(),
            search_backend: req.search_backend.clone(),
        };

        let Some((es, jq)) = &self.store else {
            // Inline-only mode: no cache, no queue, no login (spec.md §6).
            let decision = self
                .matcher
                .decide(&input, self.config.matcher_deadline)
                .await?;
            let row = transient_row(fp, &input, &decision, now);
            tracing::Span::current().record("outcome", "synchronous_inline");
            self.audit(
                &req.requestor,
                Some(fp),
                &req,
                correlation_id,
                "synchronous_inline",
            )
            .await;
            return Ok(ScreenOutcome::Evidence(row));
        };

        if let Some(row) = es.get_valid(fp, now).await? {
            tracing::Span::current().record("outcome", "cache_reuse");
            self.audit(&req.requestor, Some(fp), &req, correlation_id, "cache_reuse")
                .await;
            return Ok(ScreenOutcome::Evidence(row));
        }

        let pending_plus_running = jq.pending_plus_running().await?;
        if pending_plus_running < self.config.sync_threshold {
            let decision = self
                .matcher
                .decide(&input, self.config.matcher_deadline)
                .await?;
            let row = es.upsert(fp, &input, &decision, false, now).await?;
            tracing::Span::current().record("outcome", "synchronous");
            self.audit(&req.requestor, Some(fp), &req, correlation_id, "synchronous")
                .await;
            return Ok(ScreenOutcome::Evidence(row));
        }

        let outcome = jq.enqueue(fp, &input, false, None, now).await?;
        let outcome_label = match outcome {
            EnqueueOutcome::Reused => "reused",
            EnqueueOutcome::AlreadyPending { .. } => "already_pending",
            EnqueueOutcome::Queued { .. } => "queued",
        };
        tracing::Span::current().record("outcome", outcome_label);
        self.audit(&req.requestor, Some(fp), &req, correlation_id, outcome_label)
            .await;
        Ok(ScreenOutcome::Enqueued {
            outcome,
            fingerprint: fp,
        })
    }

    async fn audit(
        &self,
        actor: &str,
        fp: Option<opcheck_types::EntityFingerprint>,
        req: &ScreenRequest,
        correlation_id: Uuid,
        outcome: &str,
    ) {
        self.audit
            .record(AuditEvent {
                at: Utc::now(),
                actor: actor.to_string(),
                action: "screen",
                fingerprint: fp,
                business_reference: Some(req.business_reference.clone()),
                reason: Some(req.reason_for_check.as_str().to_string()),
                outcome: outcome.to_string(),
                correlation_id,
                extra: Default::default(),
            })
            .await;
    }
}

/// Builds an unpersisted `EvidenceRow` for the inline-only path (spec.md
/// §4.4 step 4) — there is no Evidence Store to own it, but the wire
/// response shape needs a row's worth of fields.
fn transient_row(
    fp: opcheck_types::EntityFingerprint,
    input: &ScreeningInput,
    decision: &opcheck_types::domain::DecisionRecord,
    now: DateTime<Utc>,
) -> EvidenceRow {
    use opcheck_types::domain::ResultBlob;

    let normalized_name = normalize_name(&input.name);
    let sources = decision.sources.clone();
    EvidenceRow {
        fingerprint: fp,
        display_name: input.name.clone(),
        normalized_name,
        date_of_birth: input.dob.as_full_date(),
        entity_type: input.entity_type,
        last_screened_at: now,
        valid_until: now + chrono::Duration::days(365),
        status: decision.status,
        risk_level: decision.risk_level,
        confidence: decision.confidence,
        score: decision.score,
        uk_sanctions_flag: decision.uk_sanctions_flag,
        pep_flag: decision.pep_flag,
        result_blob: ResultBlob {
            matched_subject: decision.matched_subject.clone(),
            matched_dob: decision.matched_dob,
            regime: decision.matched_regime,
            position: None,
            topics: vec![],
            sources,
            top_matches: decision.top_matches.clone(),
            match_found: decision.match_found(),
            check_summary_status: decision.status,
            check_summary_source: "inline".to_string(),
            check_summary_date: now,
        },
        last_requestor: input.requestor.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{AuditEvent as PortsAuditEvent};
    use async_trait::async_trait;
    use opcheck_types::domain::{
        Confidence, DecisionRecord, Job, JobStatus, RiskLevel, ScreeningStatus,
    };
    use opcheck_types::reason::ReasonForCheck;

    struct NullAudit;
    #[async_trait]
    impl AuditSink for NullAudit {
        async fn record(&self, _event: PortsAuditEvent) {}
    }

    struct StubMatcher {
        decision: DecisionRecord,
    }
    #[async_trait]
    impl Matcher for StubMatcher {
        async fn decide(
            &self,
            _input: &ScreeningInput,
            _deadline: std::time::Duration,
        ) -> Result<DecisionRecord> {
            Ok(self.decision.clone())
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

    fn base_request() -> ScreenRequest {
        ScreenRequest {
            name: "Jane Doe".to_string(),
            dob: Some("1980-05-01".to_string()),
            entity_type: None,
            requestor: "u1".to_string(),
            reason_for_check: ReasonForCheck::ClientOnboarding,
            business_reference: "CASE-1".to_string(),
            search_backend: None,
        }
    }

    #[tokio::test]
    async fn rejects_empty_name() {
        let dispatcher = Dispatcher::new(
            None,
            Arc::new(StubMatcher {
                decision: cleared_decision(),
            }),
            Arc::new(NullAudit),
            Config::from_env(),
        );
        let mut req = base_request();
        req.name = "   ".to_string();
        let err = dispatcher.screen(req, Utc::now()).await.unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[tokio::test]
    async fn inline_mode_runs_matcher_synchronously() {
        let dispatcher = Dispatcher::new(
            None,
            Arc::new(StubMatcher {
                decision: cleared_decision(),
            }),
            Arc::new(NullAudit),
            Config::from_env(),
        );
        let outcome = dispatcher.screen(base_request(), Utc::now()).await.unwrap();
        match outcome {
            ScreenOutcome::Evidence(row) => {
                assert_eq!(row.status, ScreeningStatus::Cleared);
            }
            ScreenOutcome::Enqueued { .. } => panic!("expected synchronous evidence"),
        }
    }

    struct FakeEs;
    #[async_trait]
    impl EvidenceStore for FakeEs {
        async fn get_valid(
            &self,
            _fp: opcheck_types::EntityFingerprint,
            _now: DateTime<Utc>,
        ) -> Result<Option<EvidenceRow>> {
            Ok(None)
        }
        async fn get(&self, _fp: opcheck_types::EntityFingerprint) -> Result<Option<EvidenceRow>> {
            Ok(None)
        }
        async fn upsert(
            &self,
            _fp: opcheck_types::EntityFingerprint,
            _input: &ScreeningInput,
            _decision: &DecisionRecord,
            _force_rescreen: bool,
            _now: DateTime<Utc>,
        ) -> Result<EvidenceRow> {
            unimplemented!("not exercised when load forces the enqueue branch")
        }
        async fn search_by_name(&self, _substring: &str, _limit: i64) -> Result<Vec<EvidenceRow>> {
            Ok(vec![])
        }
        async fn search_by_fp(
            &self,
            _fp: opcheck_types::EntityFingerprint,
        ) -> Result<Option<EvidenceRow>> {
            Ok(None)
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
            _outcome: opcheck_types::domain::ReviewOutcome,
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
        load: u64,
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
            Ok(EnqueueOutcome::Queued {
                job_id: Uuid::nil(),
            })
        }
        async fn claim_one(&self, _now: DateTime<Utc>) -> Result<Option<Job>> {
            Ok(None)
        }
        async fn complete(&self, _job_id: Uuid, _now: DateTime<Utc>) -> Result<()> {
            Ok(())
        }
        async fn fail(&self, _job_id: Uuid, _error_message: &str, _now: DateTime<Utc>) -> Result<()> {
            Ok(())
        }
        async fn status(&self, _job_id: Uuid) -> Result<Option<(JobStatus, Job)>> {
            Ok(None)
        }
        async fn purge_terminal_older_than(&self, _days: u32, _now: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
        async fn pending_plus_running(&self) -> Result<u64> {
            Ok(self.load)
        }
    }

    #[tokio::test]
    async fn global_load_at_threshold_enqueues_instead_of_running_synchronously() {
        let config = Config::from_env();
        let threshold = config.sync_threshold;
        let dispatcher = Dispatcher::new(
            Some((
                Arc::new(FakeEs) as Arc<dyn EvidenceStore>,
                Arc::new(FakeJq { load: threshold }) as Arc<dyn JobQueue>,
            )),
            Arc::new(StubMatcher {
                decision: cleared_decision(),
            }),
            Arc::new(NullAudit),
            config,
        );
        let outcome = dispatcher.screen(base_request(), Utc::now()).await.unwrap();
        match outcome {
            ScreenOutcome::Evidence(_) => panic!("expected the job to be enqueued under load"),
            ScreenOutcome::Enqueued { .. } => {}
        }
    }

    #[tokio::test]
    async fn global_load_below_threshold_runs_synchronously() {
        let config = Config::from_env();
        let threshold = config.sync_threshold;
        let dispatcher = Dispatcher::new(
            Some((
                Arc::new(FakeEs) as Arc<dyn EvidenceStore>,
                Arc::new(FakeJq {
                    load: threshold.saturating_sub(1),
                }) as Arc<dyn JobQueue>,
            )),
            Arc::new(StubMatcher {
                decision: cleared_decision(),
            }),
            Arc::new(NullAudit),
            config,
        );
        let outcome = dispatcher.screen(base_request(), Utc::now()).await.unwrap();
        match outcome {
            ScreenOutcome::Evidence(row) => {
                assert_eq!(row.status, ScreeningStatus::Cleared);
            }
            ScreenOutcome::Enqueued { .. } => panic!("expected synchronous evidence below threshold"),
        }
    }
}
