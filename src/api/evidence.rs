//! `GET /opcheck/evidence/{fp}` and `GET /opcheck/evidence?q=` (spec.md §6
//! supplemented features) — read access to `EvidenceStore::search_by_fp`
//! and `search_by_name`, the two lookup operations spec.md §4.2 names but
//! §6's distilled wire surface omits.

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use opcheck_types::wire::ScreenResponseBody;
use opcheck_types::EntityFingerprint;

use crate::error::{HttpError, ScreeningError};

use super::state::AppState;

pub async fn get_by_fingerprint(
    Extension(state): Extension<AppState>,
    Path(fp): Path<String>,
) -> Result<(StatusCode, Json<ScreenResponseBody>), HttpError> {
    let fp: EntityFingerprint = fp
        .parse()
        .map_err(|_| ScreeningError::invalid("fp", "not a valid entity fingerprint"))?;
    let row = state
        .require_es()?
        .search_by_fp(fp)
        .await?
        .ok_or_else(|| ScreeningError::NotFound(format!("evidence {}", fp.to_hex())))?;
    Ok((StatusCode::OK, Json(ScreenResponseBody::from(&row))))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    25
}

pub async fn search(
    Extension(state): Extension<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<(StatusCode, Json<Vec<ScreenResponseBody>>), HttpError> {
    if query.q.trim().is_empty() {
        return Err(ScreeningError::invalid("q", "search query must not be empty").into());
    }
    let limit = query.limit.clamp(1, 100);
    let rows = state.require_es()?.search_by_name(&query.q, limit).await?;
    let bodies = rows.iter().map(ScreenResponseBody::from).collect();
    Ok((StatusCode::OK, Json(bodies)))
}
