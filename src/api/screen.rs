//! `POST /opcheck` — the screening submission endpoint (spec.md §6). Maps
//! `Dispatcher::screen`'s transport-agnostic outcome onto the frozen wire
//! response bodies.

use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use opcheck_types::domain::EnqueueOutcome;
use opcheck_types::wire::{EnqueuedResponse, ScreenRequest, ScreenResponseBody};

use crate::dispatcher::ScreenOutcome;
use crate::error::HttpError;

use super::state::AppState;

pub async fn screen(
    Extension(state): Extension<AppState>,
    Json(req): Json<ScreenRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), HttpError> {
    let outcome = state.dispatcher.screen(req, Utc::now()).await?;
    match outcome {
        ScreenOutcome::Evidence(row) => {
            let body = ScreenResponseBody::from(&row);
            Ok((StatusCode::OK, Json(serde_json::to_value(body).unwrap())))
        }
        ScreenOutcome::Enqueued { outcome, fingerprint } => {
            let job_id = outcome.job_id();
            let status_code = match outcome {
                EnqueueOutcome::Reused => StatusCode::OK,
                EnqueueOutcome::AlreadyPending { .. } | EnqueueOutcome::Queued { .. } => {
                    StatusCode::ACCEPTED
                }
            };
            let body = match job_id {
                Some(job_id) => EnqueuedResponse {
                    job_id,
                    location: format!("/opcheck/jobs/{job_id}"),
                },
                None => {
                    // `Reused` with no job_id means the caller should
                    // re-fetch the now-valid evidence row directly.
                    let row = state
                        .require_es()?
                        .search_by_fp(fingerprint)
                        .await?
                        .ok_or_else(|| {
                            crate::error::ScreeningError::NotFound(fingerprint.to_hex())
                        })?;
                    let body = ScreenResponseBody::from(&row);
                    return Ok((StatusCode::OK, Json(serde_json::to_value(body).unwrap())));
                }
            };
            Ok((status_code, Json(serde_json::to_value(body).unwrap())))
        }
    }
}
