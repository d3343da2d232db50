//! The frozen wire contract (spec.md §6). These shapes must not drift —
//! every field name here is part of the stable API surface.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{EntityType, EvidenceRow, MatchSuggestion};
use crate::reason::ReasonForCheck;

/// `POST /opcheck` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreenRequest {
    pub name: String,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    pub requestor: String,
    pub reason_for_check: ReasonForCheck,
    pub business_reference: String,
    #[serde(default)]
    pub search_backend: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Date")]
    pub date: DateTime<Utc>,
}

/// Successful-screening response body. Field names are part of the frozen
/// wire contract and must match exactly (spec.md §6).
#[derive(Debug, Clone, Serialize)]
pub struct ScreenResponseBody {
    #[serde(rename = "Sanctions Name")]
    pub sanctions_name: Option<String>,
    #[serde(rename = "Birth Date")]
    pub birth_date: Option<chrono::NaiveDate>,
    #[serde(rename = "Regime")]
    pub regime: Option<String>,
    #[serde(rename = "Position")]
    pub position: Option<String>,
    #[serde(rename = "Topics")]
    pub topics: Vec<String>,
    #[serde(rename = "Is PEP")]
    pub is_pep: bool,
    #[serde(rename = "Is Sanctioned")]
    pub is_sanctioned: bool,
    #[serde(rename = "Confidence")]
    pub confidence: String,
    #[serde(rename = "Score")]
    pub score: Decimal,
    #[serde(rename = "Risk Level")]
    pub risk_level: String,
    #[serde(rename = "Top Matches")]
    pub top_matches: Vec<MatchSuggestion>,
    #[serde(rename = "Match Found")]
    pub match_found: bool,
    #[serde(rename = "Check Summary")]
    pub check_summary: CheckSummary,
    #[serde(rename = "entity_key", skip_serializing_if = "Option::is_none")]
    pub entity_key: Option<String>,
}

impl From<&EvidenceRow> for ScreenResponseBody {
    fn from(row: &EvidenceRow) -> Self {
        let blob = &row.result_blob;
        Self {
            sanctions_name: blob.matched_subject.clone(),
            birth_date: blob.matched_dob,
            regime: blob.regime.map(|r| r.as_str().to_string()),
            position: blob.position.clone(),
            topics: blob.topics.clone(),
            is_pep: row.pep_flag,
            is_sanctioned: matches!(
                row.status,
                crate::domain::ScreeningStatus::FailSanction
            ),
            confidence: row.confidence.as_str().to_string(),
            score: row.score,
            risk_level: row.risk_level.as_str().to_string(),
            top_matches: blob.top_matches.clone(),
            match_found: blob.match_found,
            check_summary: CheckSummary {
                status: row.status.as_str().to_string(),
                source: blob.check_summary_source.clone(),
                date: blob.check_summary_date,
            },
            entity_key: Some(row.fingerprint.to_hex()),
        }
    }
}

/// `202` body: job accepted for asynchronous processing.
#[derive(Debug, Clone, Serialize)]
pub struct EnqueuedResponse {
    pub job_id: Uuid,
    pub location: String,
}

/// `GET /opcheck/jobs/{job_id}` response.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub status: String,
    pub job_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScreenResponseBody>,
}

/// One element of the bulk-enqueue response array.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcomeItem {
    pub status: BulkItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkItemStatus {
    Reused,
    AlreadyPending,
    Queued,
    Error,
}

/// `POST /refresh_opensanctions` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTriggerRequest {
    #[serde(default)]
    pub include_peps: Option<bool>,
    #[serde(default = "default_true")]
    pub sync_postgres: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshDelta {
    pub added: i64,
    pub removed: i64,
    pub changed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRescreenSummary {
    pub candidates: i64,
    pub queued: i64,
    pub already_pending: i64,
    pub reused: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRunSummary {
    pub run_id: Uuid,
    pub uk_hash: String,
    pub uk_changed: bool,
    pub delta: RefreshDelta,
    pub rescreen: RefreshRescreenSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshTriggerResponse {
    pub status: String,
    pub postgres_synced: bool,
    pub postgres_rows: i64,
    pub refresh_run: RefreshRunSummary,
}

/// Machine-readable field indicator for `400 InvalidInput` responses.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidInputBody {
    pub error: String,
    pub field: String,
}

/// `POST .../review/complete` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewCompleteRequest {
    pub actor: String,
    pub outcome: crate::domain::ReviewOutcome,
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewClaimRequest {
    pub actor: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FalsePositiveRequest {
    pub actor: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_body_uses_frozen_keys() {
        let body = ScreenResponseBody {
            sanctions_name: Some("Jane Doe".into()),
            birth_date: None,
            regime: None,
            position: None,
            topics: vec![],
            is_pep: false,
            is_sanctioned: false,
            confidence: "Very High".into(),
            score: Decimal::ZERO,
            risk_level: "Cleared".into(),
            top_matches: vec![],
            match_found: false,
            check_summary: CheckSummary {
                status: "Cleared".into(),
                source: "internal".into(),
                date: Utc::now(),
            },
            entity_key: Some("abc".into()),
        };
        let json = serde_json::to_value(&body).unwrap();
        for key in [
            "Sanctions Name",
            "Birth Date",
            "Regime",
            "Position",
            "Topics",
            "Is PEP",
            "Is Sanctioned",
            "Confidence",
            "Score",
            "Risk Level",
            "Top Matches",
            "Match Found",
            "Check Summary",
            "entity_key",
        ] {
            assert!(json.get(key).is_some(), "missing wire key {key}");
        }
    }
}
