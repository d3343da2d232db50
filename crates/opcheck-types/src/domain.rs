//! Core domain enums and rows: `EvidenceRow`, `Job`, `RefreshRun`, and the
//! small enums that drive decisioning and review.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::fingerprint::EntityFingerprint;

/// `Person` or `Organization` — defaults to `Person` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text"))]
pub enum EntityType {
    Person,
    Organization,
}

impl Default for EntityType {
    fn default() -> Self {
        Self::Person
    }
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::Organization => "Organization",
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Person" => Ok(Self::Person),
            "Organization" => Ok(Self::Organization),
            other => Err(format!("unknown entity_type: {other}")),
        }
    }
}

/// Decision outcome of a completed screening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text"))]
pub enum ScreeningStatus {
    Cleared,
    #[serde(rename = "Fail PEP")]
    #[cfg_attr(feature = "database", sqlx(rename = "Fail PEP"))]
    FailPep,
    #[serde(rename = "Fail Sanction")]
    #[cfg_attr(feature = "database", sqlx(rename = "Fail Sanction"))]
    FailSanction,
}

impl ScreeningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleared => "Cleared",
            Self::FailPep => "Fail PEP",
            Self::FailSanction => "Fail Sanction",
        }
    }
}

impl std::fmt::Display for ScreeningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text"))]
pub enum RiskLevel {
    Cleared,
    #[serde(rename = "Medium Risk")]
    #[cfg_attr(feature = "database", sqlx(rename = "Medium Risk"))]
    MediumRisk,
    #[serde(rename = "High Risk")]
    #[cfg_attr(feature = "database", sqlx(rename = "High Risk"))]
    HighRisk,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleared => "Cleared",
            Self::MediumRisk => "Medium Risk",
            Self::HighRisk => "High Risk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text"))]
pub enum Confidence {
    #[serde(rename = "Very High")]
    #[cfg_attr(feature = "database", sqlx(rename = "Very High"))]
    VeryHigh,
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryHigh => "Very High",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Confidence band from a decision score, per spec.md §4.5.
    pub fn from_decision_score(score: Decimal) -> Self {
        if score >= Decimal::from(90) {
            Self::High
        } else if score >= Decimal::from(80) {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Regime labels a failing decision may cite (spec.md §4.5 allow-list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    #[serde(rename = "UN")]
    Un,
    #[serde(rename = "OFAC")]
    Ofac,
    /// HM Treasury / HMT / OFSI — the UK-scoped regime.
    #[serde(rename = "HM Treasury")]
    HmTreasury,
    #[serde(rename = "EU Council")]
    EuCouncil,
    #[serde(rename = "Consolidated PEP List")]
    ConsolidatedPep,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Un => "UN",
            Self::Ofac => "OFAC",
            Self::HmTreasury => "HM Treasury",
            Self::EuCouncil => "EU Council",
            Self::ConsolidatedPep => "Consolidated PEP List",
        }
    }

    /// Only HM Treasury (HMT/OFSI) is UK-scoped per the glossary.
    pub fn is_uk_scoped(&self) -> bool {
        matches!(self, Self::HmTreasury)
    }
}

/// A single advisory "top match" suggestion (suggestion-threshold pass,
/// not filtered by DOB).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSuggestion {
    pub name: String,
    pub score: Decimal,
    pub regime: Option<Regime>,
}

/// Structured, schema-constrained payload carried by an `EvidenceRow`.
/// Opaque to callers other than through the frozen wire keys in `wire`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultBlob {
    pub matched_subject: Option<String>,
    pub matched_dob: Option<chrono::NaiveDate>,
    pub regime: Option<Regime>,
    pub position: Option<String>,
    pub topics: Vec<String>,
    pub sources: Vec<Regime>,
    pub top_matches: Vec<MatchSuggestion>,
    pub match_found: bool,
    pub check_summary_status: ScreeningStatus,
    pub check_summary_source: String,
    pub check_summary_date: DateTime<Utc>,
}

/// One row per `EntityFingerprint` — the durable evidence of the latest
/// screening, never duplicated (replaced in place on re-screen).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct EvidenceRow {
    pub fingerprint: EntityFingerprint,
    pub display_name: String,
    pub normalized_name: String,
    pub date_of_birth: Option<chrono::NaiveDate>,
    pub entity_type: EntityType,

    pub last_screened_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,

    pub status: ScreeningStatus,
    pub risk_level: RiskLevel,
    pub confidence: Confidence,
    pub score: Decimal,
    pub uk_sanctions_flag: bool,
    pub pep_flag: bool,

    #[cfg_attr(feature = "database", sqlx(json))]
    pub result_blob: ResultBlob,

    pub last_requestor: String,
    pub updated_at: DateTime<Utc>,

    pub review_state: ReviewState,
    pub review_outcome: Option<ReviewOutcome>,
    pub review_notes: Option<String>,
    pub review_claimed_by: Option<String>,
    pub review_claimed_at: Option<DateTime<Utc>>,
    pub review_completed_by: Option<String>,
    pub review_completed_at: Option<DateTime<Utc>>,
    pub false_positive_reason: Option<String>,
    pub false_positive_override: bool,
}

impl EvidenceRow {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text"))]
pub enum ReviewState {
    #[serde(rename = "UNREVIEWED")]
    #[cfg_attr(feature = "database", sqlx(rename = "UNREVIEWED"))]
    Unreviewed,
    #[serde(rename = "IN_REVIEW")]
    #[cfg_attr(feature = "database", sqlx(rename = "IN_REVIEW"))]
    InReview,
    #[serde(rename = "COMPLETED")]
    #[cfg_attr(feature = "database", sqlx(rename = "COMPLETED"))]
    Completed,
}

/// The fixed review outcome set (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text"))]
pub enum ReviewOutcome {
    #[serde(rename = "False Positive – Proceeded")]
    #[cfg_attr(feature = "database", sqlx(rename = "False Positive – Proceeded"))]
    FalsePositiveProceeded,
    #[serde(rename = "False Positive – Payment Released")]
    #[cfg_attr(
        feature = "database",
        sqlx(rename = "False Positive – Payment Released")
    )]
    FalsePositivePaymentReleased,
    #[serde(rename = "Confirmed Match – Payment Blocked")]
    #[cfg_attr(
        feature = "database",
        sqlx(rename = "Confirmed Match – Payment Blocked")
    )]
    ConfirmedMatchPaymentBlocked,
    #[serde(rename = "Confirmed Match – Escalated to Compliance")]
    #[cfg_attr(
        feature = "database",
        sqlx(rename = "Confirmed Match – Escalated to Compliance")
    )]
    ConfirmedMatchEscalated,
    #[serde(rename = "Pending External Review")]
    #[cfg_attr(feature = "database", sqlx(rename = "Pending External Review"))]
    PendingExternalReview,
    #[serde(rename = "Cancelled / No Action Required")]
    #[cfg_attr(
        feature = "database",
        sqlx(rename = "Cancelled / No Action Required")
    )]
    CancelledNoAction,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FalsePositiveProceeded => "False Positive – Proceeded",
            Self::FalsePositivePaymentReleased => "False Positive – Payment Released",
            Self::ConfirmedMatchPaymentBlocked => "Confirmed Match – Payment Blocked",
            Self::ConfirmedMatchEscalated => "Confirmed Match – Escalated to Compliance",
            Self::PendingExternalReview => "Pending External Review",
            Self::CancelledNoAction => "Cancelled / No Action Required",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::FalsePositiveProceeded,
            Self::FalsePositivePaymentReleased,
            Self::ConfirmedMatchPaymentBlocked,
            Self::ConfirmedMatchEscalated,
            Self::PendingExternalReview,
            Self::CancelledNoAction,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// The caller-supplied DOB, normalized to one of three shapes (spec.md
/// §4.1/§4.5): absent, a full calendar date, or a bare year. Plain
/// `Option<NaiveDate>` cannot carry the year-only case, which the Matcher's
/// DOB constraint (§4.5) treats distinctly from both "no DOB given" and "a
/// full DOB that doesn't match".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DobQuery {
    None,
    Full(chrono::NaiveDate),
    YearOnly(i32),
}

impl DobQuery {
    pub fn as_full_date(&self) -> Option<chrono::NaiveDate> {
        match self {
            Self::Full(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Render as `YYYY-MM-DD`, `YYYY`, or empty — identical to the EKD's
    /// `normalize_dob` encoding, which is also this type's storage form.
    pub fn to_normalized_string(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Full(d) => d.format("%Y-%m-%d").to_string(),
            Self::YearOnly(y) => y.to_string(),
        }
    }
}

impl Default for DobQuery {
    fn default() -> Self {
        Self::None
    }
}

#[cfg(feature = "database")]
impl sqlx::Type<sqlx::Postgres> for DobQuery {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "database")]
impl sqlx::Encode<'_, sqlx::Postgres> for DobQuery {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode(self.to_normalized_string(), buf)
    }
}

#[cfg(feature = "database")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for DobQuery {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(if s.is_empty() {
            DobQuery::None
        } else if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
            DobQuery::YearOnly(s.parse().unwrap_or_default())
        } else {
            chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map(DobQuery::Full)
                .unwrap_or(DobQuery::None)
        })
    }
}

/// One per enqueue. At most one `{pending, running}` job exists per
/// fingerprint at any instant (enforced at enqueue time, spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Job {
    pub job_id: Uuid,
    pub fingerprint: EntityFingerprint,
    pub name: String,
    pub dob: DobQuery,
    pub entity_type: EntityType,
    pub requestor: String,
    pub reason: crate::reason::ReasonForCheck,
    pub business_reference: String,
    pub refresh_run_id: Option<Uuid>,
    pub force_rescreen: bool,

    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Result of `JobQueue::enqueue` — an explicit outcome variant rather than
/// an exception, per spec.md §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnqueueOutcome {
    Reused,
    AlreadyPending { job_id: Uuid },
    Queued { job_id: Uuid },
}

impl EnqueueOutcome {
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Self::Reused => None,
            Self::AlreadyPending { job_id } | Self::Queued { job_id } => Some(*job_id),
        }
    }
}

/// One record per refresh run (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct RefreshRun {
    pub run_id: Uuid,
    pub ran_at: DateTime<Utc>,
    pub uk_hash: String,
    pub prev_uk_hash: Option<String>,
    pub uk_row_count: i64,
    pub delta_added: i64,
    pub delta_removed: i64,
    pub delta_changed: i64,
    pub candidate_count: i64,
    pub queued_count: i64,
    pub reused_count: i64,
    pub already_pending_count: i64,
    pub failed_count: i64,
}

impl RefreshRun {
    pub fn uk_changed(&self, prior: Option<&str>) -> bool {
        prior.map(|p| p != self.uk_hash).unwrap_or(true)
    }
}

/// Inputs the dispatcher/worker pass to the Matcher and to `ES::upsert`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningInput {
    pub name: String,
    pub dob: DobQuery,
    pub entity_type: EntityType,
    pub requestor: String,
    pub reason: crate::reason::ReasonForCheck,
    pub business_reference: String,
    pub search_backend: Option<String>,
}

/// Outcome of a `Matcher` invocation — the decision record of spec.md §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub status: ScreeningStatus,
    pub risk_level: RiskLevel,
    pub confidence: Confidence,
    pub score: Decimal,
    pub uk_sanctions_flag: bool,
    pub pep_flag: bool,
    pub matched_subject: Option<String>,
    pub matched_dob: Option<chrono::NaiveDate>,
    pub matched_regime: Option<Regime>,
    pub sources: Vec<Regime>,
    pub top_matches: Vec<MatchSuggestion>,
}

impl DecisionRecord {
    pub fn match_found(&self) -> bool {
        !matches!(self.status, ScreeningStatus::Cleared)
    }
}

/// Additional metadata the dispatch path stamps onto every audit event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditExtra(pub HashMap<String, serde_json::Value>);
