//! Authorization for the internal-only endpoints: bulk submit, refresh
//! trigger, and the admin retention sweep (spec.md §6). None of these sit
//! behind the public screening API's rate governor — they are reached
//! either by a shared `InternalApiKey` header or by source IP allowlist,
//! the same two-mechanism-or-503 shape the teacher's JWT middleware would
//! apply if this engine had end-user login instead of service-to-service
//! callers.

use std::net::IpAddr;

use axum::http::HeaderMap;

use crate::config::Config;
use crate::error::{Result, ScreeningError};

const INTERNAL_API_KEY_HEADER: &str = "x-internal-api-key";

/// `503` if neither mechanism is configured, `401` if a key was required
/// and didn't match, `403` if only IP allowlisting is configured and the
/// caller's IP isn't on it.
pub fn authorize_internal(config: &Config, headers: &HeaderMap, caller_ip: IpAddr) -> Result<()> {
    if !config.internal_api_enabled() {
        return Err(ScreeningError::StoreUnavailable(
            "internal API not configured".into(),
        ));
    }

    if let Some(expected) = &config.internal_api_key {
        let provided = headers
            .get(INTERNAL_API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided == Some(expected.as_str()) {
            return Ok(());
        }
        if config.internal_ip_allowlist.is_empty() {
            return Err(ScreeningError::Unauthorized(
                "missing or incorrect internal API key".into(),
            ));
        }
    }

    if config
        .internal_ip_allowlist
        .iter()
        .any(|ip| ip.parse::<IpAddr>().map(|a| a == caller_ip).unwrap_or(false))
    {
        return Ok(());
    }

    Err(ScreeningError::Forbidden(
        "caller is not on the internal IP allowlist".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn base_config() -> Config {
        Config {
            storage_url: None,
            token_signing_secret: None,
            trusted_proxy_ips: vec![],
            rate_limit_storage_url: None,
            sync_threshold: 5,
            worker_poll: Duration::from_secs(5),
            cleanup_every_n_loops: 50,
            job_retention_days: 7,
            evidence_retention_months: None,
            match_threshold: 75,
            suggestion_threshold: 60,
            matcher_deadline: Duration::from_secs(30),
            validity_days: 365,
            internal_api_key: None,
            internal_ip_allowlist: vec![],
        }
    }

    #[test]
    fn disabled_without_either_mechanism() {
        let config = base_config();
        let headers = HeaderMap::new();
        let err = authorize_internal(&config, &headers, "127.0.0.1".parse().unwrap()).unwrap_err();
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn correct_key_passes() {
        let mut config = base_config();
        config.internal_api_key = Some("secret".into());
        let mut headers = HeaderMap::new();
        headers.insert(INTERNAL_API_KEY_HEADER, "secret".parse().unwrap());
        authorize_internal(&config, &headers, "127.0.0.1".parse().unwrap()).unwrap();
    }

    #[test]
    fn wrong_key_is_unauthorized() {
        let mut config = base_config();
        config.internal_api_key = Some("secret".into());
        let mut headers = HeaderMap::new();
        headers.insert(INTERNAL_API_KEY_HEADER, "wrong".parse().unwrap());
        let err = authorize_internal(&config, &headers, "127.0.0.1".parse().unwrap()).unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn allowlisted_ip_passes_without_key() {
        let mut config = base_config();
        config.internal_ip_allowlist = vec!["10.0.0.5".into()];
        let headers = HeaderMap::new();
        authorize_internal(&config, &headers, "10.0.0.5".parse().unwrap()).unwrap();
    }

    #[test]
    fn unlisted_ip_is_forbidden() {
        let mut config = base_config();
        config.internal_ip_allowlist = vec!["10.0.0.5".into()];
        let headers = HeaderMap::new();
        let err = authorize_internal(&config, &headers, "10.0.0.9".parse().unwrap()).unwrap_err();
        assert_eq!(err.http_status(), 403);
    }
}
