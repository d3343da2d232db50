//! Error kinds for the screening engine (spec.md §7). Lives alongside the
//! port traits in this crate so that `opcheck-matcher` and `opcheck-postgres`
//! can return it without depending on the root `opcheck` crate — mirroring
//! the teacher's `sem_os_core::error::SemOsError` sitting next to
//! `sem_os_core::ports`, with HTTP mapping left to a root-crate wrapper type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreeningError {
    /// Caller-visible; 400. Carries the offending field name.
    #[error("invalid input: {message} (field: {field})")]
    InvalidInput { field: String, message: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// 429 with a retry-after hint, seconds.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("matcher unavailable: {0}")]
    MatcherUnavailable(String),

    /// Internal-only: illegal job/review state transition. Worker logs and
    /// proceeds; never surfaced verbatim to a caller.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ScreeningError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::RateLimited { .. } => 429,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::StoreUnavailable(_) => 503,
            Self::MatcherUnavailable(_) => 503,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScreeningError>;

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
