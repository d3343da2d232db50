//! `PgAuditSink`: durable half of the append-only audit log (spec.md
//! §4.10). Implements `FallibleAuditSink` — the root crate's
//! `audit::BestEffort` decorator adapts this into the infallible
//! `AuditSink` the Dispatcher/Worker hold, the same split the teacher draws
//! between `PgAuditStore` (can fail) and its callers (log-and-continue).

use async_trait::async_trait;
use opcheck_types::ports::{AuditEvent, FallibleAuditSink};
use sqlx::PgPool;

pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FallibleAuditSink for PgAuditSink {
    async fn try_record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO opcheck.audit_log (
                at, actor, action, fingerprint, business_reference, reason,
                outcome, correlation_id, extra
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.at)
        .bind(&event.actor)
        .bind(event.action)
        .bind(event.fingerprint.map(|fp| fp.to_hex()))
        .bind(&event.business_reference)
        .bind(&event.reason)
        .bind(&event.outcome)
        .bind(event.correlation_id)
        .bind(serde_json::to_value(&event.extra.0)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
