//! Audit Sink (spec.md §4.10): append-only structured event log. Delivery
//! is best-effort — implementations log-and-continue on failure rather
//! than propagate to the caller, mirroring `OutboxDispatcher::run`'s
//! "record the error, keep going" pattern.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::ports::{AuditEvent, AuditSink, FallibleAuditSink};

/// Fallback sink used in inline-only mode (no storage configured): every
/// event is logged at `info` level and otherwise discarded. A persistent
/// deployment wires in `opcheck_postgres::audit_store::PostgresAuditSink`
/// instead.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        tracing::info!(
            actor = %event.actor,
            action = event.action,
            fingerprint = event.fingerprint.map(|f| f.to_hex()),
            business_reference = event.business_reference.as_deref(),
            reason = event.reason.as_deref(),
            outcome = %event.outcome,
            correlation_id = %event.correlation_id,
            "audit event"
        );
    }
}

/// Wraps a fallible sink and guarantees `record` never panics or blocks the
/// caller on a delivery failure. Components depend on `Arc<dyn AuditSink>`
/// directly; this decorator is how a Postgres-backed sink is made
/// best-effort without leaking that detail into every call site.
pub struct BestEffort<S> {
    inner: S,
}

impl<S> BestEffort<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: FallibleAuditSink + Send + Sync> AuditSink for BestEffort<S> {
    async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.inner.try_record(&event).await {
            error!(
                correlation_id = %event.correlation_id,
                error = %e,
                "failed to deliver audit event; dropping"
            );
        }
    }
}

pub fn default_sink() -> Arc<dyn AuditSink> {
    Arc::new(TracingAuditSink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use opcheck_types::domain::AuditExtra;
    use uuid::Uuid;

    struct AlwaysFails;

    #[async_trait]
    impl FallibleAuditSink for AlwaysFails {
        async fn try_record(&self, _event: &AuditEvent) -> anyhow::Result<()> {
            anyhow::bail!("storage unreachable")
        }
    }

    #[tokio::test]
    async fn best_effort_never_panics_on_failure() {
        let sink = BestEffort::new(AlwaysFails);
        sink.record(AuditEvent {
            at: Utc::now(),
            actor: "tester".into(),
            action: "screen",
            fingerprint: None,
            business_reference: None,
            reason: None,
            outcome: "queued".into(),
            correlation_id: Uuid::new_v4(),
            extra: AuditExtra::default(),
        })
        .await;
    }
}
