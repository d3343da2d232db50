//! `POST /opcheck/bulk` — internal-only bulk enqueue (spec.md §6
//! supplemented features), up to 500 items per call. Each item is enqueued
//! independently through the same `Dispatcher`-adjacent path as a single
//! screen, so one bad item never aborts the batch — failures are reported
//! per-item rather than failing the whole request.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::Utc;
use opcheck_types::domain::EnqueueOutcome;
use opcheck_types::wire::{BulkItemStatus, BulkOutcomeItem, ScreenRequest};
use std::net::SocketAddr;

use crate::dispatcher::ScreenOutcome;
use crate::error::{HttpError, ScreeningError};

use super::auth::authorize_internal;
use super::client_ip;
use super::state::AppState;

const MAX_BULK_ITEMS: usize = 500;

pub async fn bulk_screen(
    Extension(state): Extension<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(items): Json<Vec<ScreenRequest>>,
) -> Result<(StatusCode, Json<Vec<BulkOutcomeItem>>), HttpError> {
    let ip = client_ip::resolve(
        &headers,
        &ConnectInfo(peer),
        &state.config.trusted_proxy_ips,
    );
    authorize_internal(&state.config, &headers, ip)?;

    if items.is_empty() {
        return Err(ScreeningError::invalid("items", "bulk request must not be empty").into());
    }
    if items.len() > MAX_BULK_ITEMS {
        return Err(ScreeningError::invalid(
            "items",
            format!("bulk request exceeds the {MAX_BULK_ITEMS}-item limit"),
        )
        .into());
    }

    let mut results = Vec::with_capacity(items.len());
    for req in items {
        let now = Utc::now();
        let outcome = state.dispatcher.screen(req, now).await;
        results.push(match outcome {
            // Cache hit or synchronous completion both resolved without a
            // job; the wire status set has no separate "synchronous" case.
            Ok(ScreenOutcome::Evidence(_)) => BulkOutcomeItem {
                status: BulkItemStatus::Reused,
                job_id: None,
                error: None,
            },
            Ok(ScreenOutcome::Enqueued { outcome, .. }) => match outcome {
                EnqueueOutcome::Reused => BulkOutcomeItem {
                    status: BulkItemStatus::Reused,
                    job_id: None,
                    error: None,
                },
                EnqueueOutcome::AlreadyPending { job_id } => BulkOutcomeItem {
                    status: BulkItemStatus::AlreadyPending,
                    job_id: Some(job_id),
                    error: None,
                },
                EnqueueOutcome::Queued { job_id } => BulkOutcomeItem {
                    status: BulkItemStatus::Queued,
                    job_id: Some(job_id),
                    error: None,
                },
            },
            Err(e) => BulkOutcomeItem {
                status: BulkItemStatus::Error,
                job_id: None,
                error: Some(e.to_string()),
            },
        });
    }

    Ok((StatusCode::OK, Json(results)))
}
