//! `POST /refresh_opensanctions` — manual refresh trigger (spec.md §4.7,
//! §6). Internal-only, since it is meant to be called once a new watchlist
//! snapshot is in place.
//!
//! Materializing that snapshot is out of scope (spec.md §1); what this
//! handler owns instead is the UK hash the Refresh Coordinator diffs
//! against, computed from the same `WatchlistSource` the Matcher already
//! reads through — a sorted, newline-joined list of UK-scoped (HM
//! Treasury) subject ids, SHA-256'd. Precise row-identity delta (added/
//! removed/changed) needs the ingestion pipeline's prior-snapshot bookkeeping,
//! which this crate does not own, so the delta reported here is a coarse
//! row-count comparison against the previous run (spec.md §9 Open Question,
//! resolved in DESIGN.md).

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::Utc;
use opcheck_types::domain::EntityType;
use opcheck_types::wire::{
    RefreshDelta, RefreshRescreenSummary, RefreshRunSummary, RefreshTriggerRequest,
    RefreshTriggerResponse,
};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

use crate::error::HttpError;

use super::auth::authorize_internal;
use super::client_ip;
use super::state::AppState;

async fn compute_uk_hash(state: &AppState) -> crate::error::Result<(String, i64)> {
    let watchlist = state.require_watchlist()?;
    let mut subject_ids = Vec::new();
    for entity_type in [EntityType::Person, EntityType::Organization] {
        let rows = watchlist.sanctions_candidates(entity_type).await?;
        subject_ids.extend(
            rows.into_iter()
                .filter(|r| r.regime.is_uk_scoped())
                .map(|r| r.subject_id),
        );
    }
    subject_ids.sort();

    let mut hasher = Sha256::new();
    for id in &subject_ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    let hash = hex::encode(hasher.finalize());
    Ok((hash, subject_ids.len() as i64))
}

pub async fn trigger(
    Extension(state): Extension<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<RefreshTriggerRequest>,
) -> Result<(StatusCode, Json<RefreshTriggerResponse>), HttpError> {
    let ip = client_ip::resolve(
        &headers,
        &ConnectInfo(peer),
        &state.config.trusted_proxy_ips,
    );
    authorize_internal(&state.config, &headers, ip)?;
    let _ = req.include_peps;

    if !req.sync_postgres {
        return Ok((
            StatusCode::OK,
            Json(RefreshTriggerResponse {
                status: "skipped".to_string(),
                postgres_synced: false,
                postgres_rows: 0,
                refresh_run: empty_run_summary(),
            }),
        ));
    }

    let (uk_hash, uk_row_count) = compute_uk_hash(&state).await?;
    let outcome = state
        .require_refresh()?
        .run(
            uk_hash,
            uk_row_count,
            RefreshDelta {
                added: 0,
                removed: 0,
                changed: 0,
            },
            Utc::now(),
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(RefreshTriggerResponse {
            status: "completed".to_string(),
            postgres_synced: true,
            postgres_rows: outcome.run.uk_row_count,
            refresh_run: RefreshRunSummary {
                run_id: outcome.run.run_id,
                uk_hash: outcome.run.uk_hash.clone(),
                uk_changed: outcome.uk_changed,
                delta: RefreshDelta {
                    added: outcome.run.delta_added,
                    removed: outcome.run.delta_removed,
                    changed: outcome.run.delta_changed,
                },
                rescreen: RefreshRescreenSummary {
                    candidates: outcome.rescreen.candidates,
                    queued: outcome.rescreen.queued,
                    already_pending: outcome.rescreen.already_pending,
                    reused: outcome.rescreen.reused,
                    failed: outcome.rescreen.failed,
                },
            },
        }),
    ))
}

fn empty_run_summary() -> RefreshRunSummary {
    RefreshRunSummary {
        run_id: uuid::Uuid::nil(),
        uk_hash: String::new(),
        uk_changed: false,
        delta: RefreshDelta {
            added: 0,
            removed: 0,
            changed: 0,
        },
        rescreen: RefreshRescreenSummary {
            candidates: 0,
            queued: 0,
            already_pending: 0,
            reused: 0,
            failed: 0,
        },
    }
}
