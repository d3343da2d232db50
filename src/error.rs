//! Error kinds for the screening engine (spec.md §7), mapped to HTTP status
//! codes at the axum boundary. The enum and its `Result` alias live in
//! `opcheck_types::error` so that every workspace crate can return it from a
//! port method without depending back on this binary crate; this module
//! re-exports it and adds the axum `IntoResponse` mapping behind a newtype
//! (`HttpError`), grounded on `sem_os_server::error::AppError` — a thin
//! wrapper is required here because neither the trait nor the error type is
//! local to this crate.

pub use opcheck_types::error::{Result, ScreeningError};

#[cfg(feature = "server")]
pub struct HttpError(pub ScreeningError);

#[cfg(feature = "server")]
impl From<ScreeningError> for HttpError {
    fn from(e: ScreeningError) -> Self {
        Self(e)
    }
}

#[cfg(feature = "server")]
mod axum_impl {
    use super::{HttpError, ScreeningError};
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use serde_json::json;

    impl IntoResponse for HttpError {
        fn into_response(self) -> Response {
            let err = self.0;
            let status = StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

            let mut body = json!({
                "error": err.to_string(),
                "code": status.as_u16(),
            });

            if let ScreeningError::InvalidInput { field, .. } = &err {
                body["field"] = json!(field);
            }
            if let ScreeningError::RateLimited { retry_after_secs } = &err {
                body["retry_after_seconds"] = json!(retry_after_secs);
                let mut response = (status, Json(body)).into_response();
                response.headers_mut().insert(
                    "Retry-After",
                    retry_after_secs.to_string().parse().unwrap(),
                );
                return response;
            }

            (status, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_matches_spec() {
        assert_eq!(ScreeningError::invalid("name", "empty").http_status(), 400);
        assert_eq!(ScreeningError::Unauthorized("x".into()).http_status(), 401);
        assert_eq!(ScreeningError::Forbidden("x".into()).http_status(), 403);
        assert_eq!(
            ScreeningError::RateLimited { retry_after_secs: 5 }.http_status(),
            429
        );
        assert_eq!(ScreeningError::NotFound("x".into()).http_status(), 404);
        assert_eq!(ScreeningError::Conflict("x".into()).http_status(), 409);
        assert_eq!(
            ScreeningError::StoreUnavailable("x".into()).http_status(),
            503
        );
        assert_eq!(
            ScreeningError::MatcherUnavailable("x".into()).http_status(),
            503
        );
    }
}
