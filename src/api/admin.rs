//! Internal admin retention-sweep endpoint (spec.md §6 supplemented
//! features): triggers the same `purge_terminal_older_than`/`purge_older_than`
//! sweeps the Worker runs periodically (§4.6 point 5), on demand for
//! operators who don't want to wait for the next scheduled pass.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;

use crate::error::HttpError;

use super::auth::authorize_internal;
use super::client_ip;
use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct RetentionSweepResponse {
    pub jobs_purged: u64,
    pub evidence_purged: u64,
}

pub async fn retention_sweep(
    Extension(state): Extension<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<RetentionSweepResponse>), HttpError> {
    let ip = client_ip::resolve(
        &headers,
        &ConnectInfo(peer),
        &state.config.trusted_proxy_ips,
    );
    authorize_internal(&state.config, &headers, ip)?;

    let now = Utc::now();
    let jobs_purged = state
        .require_jq()?
        .purge_terminal_older_than(state.config.job_retention_days, now)
        .await?;
    let evidence_purged = match state.config.evidence_retention_months {
        Some(months) => state.require_es()?.purge_older_than(months, now).await?,
        None => 0,
    };

    Ok((
        StatusCode::OK,
        Json(RetentionSweepResponse {
            jobs_purged,
            evidence_purged,
        }),
    ))
}
