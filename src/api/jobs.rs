//! `GET /opcheck/jobs/{job_id}` — job status lookup (spec.md §4.3/§6). A
//! completed job is joined against the Evidence Store by fingerprint so the
//! caller gets the full result without a second request.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use opcheck_types::domain::JobStatus;
use opcheck_types::wire::{JobStatusResponse, ScreenResponseBody};
use uuid::Uuid;

use crate::error::{HttpError, ScreeningError};

use super::state::AppState;

pub async fn get_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<(StatusCode, Json<JobStatusResponse>), HttpError> {
    let jq = state.require_jq()?;
    let Some((status, job)) = jq.status(job_id).await? else {
        return Err(ScreeningError::NotFound(format!("job {job_id}")).into());
    };

    let result = if status == JobStatus::Completed {
        state
            .require_es()?
            .search_by_fp(job.fingerprint)
            .await?
            .map(|row| ScreenResponseBody::from(&row))
    } else {
        None
    };

    let body = JobStatusResponse {
        status: status.as_str().to_string(),
        job_id,
        error_message: job.error_message,
        result,
    };
    Ok((StatusCode::OK, Json(body)))
}
