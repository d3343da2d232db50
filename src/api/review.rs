//! Review State Machine endpoints (spec.md §4.8, §6 supplemented features):
//! claim, complete, and the false-positive override, all delegated straight
//! to `EvidenceStore` — the RSM's invariants (fixed outcome set, 10-char
//! minimum notes, UNREVIEWED-only claim) are enforced there, not duplicated
//! here.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use opcheck_types::wire::{FalsePositiveRequest, ReviewClaimRequest, ReviewCompleteRequest};
use opcheck_types::EntityFingerprint;

use crate::error::{HttpError, ScreeningError};

use super::state::AppState;

fn parse_fp(fp: &str) -> Result<EntityFingerprint, ScreeningError> {
    fp.parse()
        .map_err(|_| ScreeningError::invalid("fp", "not a valid entity fingerprint"))
}

pub async fn claim(
    Extension(state): Extension<AppState>,
    Path(fp): Path<String>,
    Json(req): Json<ReviewClaimRequest>,
) -> Result<StatusCode, HttpError> {
    let fp = parse_fp(&fp)?;
    state
        .require_es()?
        .claim_review(fp, &req.actor, Utc::now())
        .await?;
    Ok(StatusCode::OK)
}

pub async fn complete(
    Extension(state): Extension<AppState>,
    Path(fp): Path<String>,
    Json(req): Json<ReviewCompleteRequest>,
) -> Result<StatusCode, HttpError> {
    let fp = parse_fp(&fp)?;
    state
        .require_es()?
        .complete_review(fp, &req.actor, req.outcome, &req.notes, Utc::now())
        .await?;
    Ok(StatusCode::OK)
}

pub async fn false_positive(
    Extension(state): Extension<AppState>,
    Path(fp): Path<String>,
    Json(req): Json<FalsePositiveRequest>,
) -> Result<StatusCode, HttpError> {
    let fp = parse_fp(&fp)?;
    state
        .require_es()?
        .mark_false_positive(fp, &req.reason, &req.actor, Utc::now())
        .await?;
    Ok(StatusCode::OK)
}
