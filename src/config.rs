//! Process configuration, assembled once from environment variables at
//! startup and passed by value to every component (spec.md §5, §9 — "no
//! global mutable configuration is modified at runtime"). Follows the
//! teacher's `std::env::var(...).unwrap_or_else(...)` style rather than a
//! config-file crate.

use std::time::Duration;

/// Assembled once in `main`. Cheap to clone; hand out `Arc<Config>` or pass
/// by value as the components need.
#[derive(Debug, Clone)]
pub struct Config {
    /// When `None`, the dispatcher operates in inline-only mode: no cache,
    /// no queue, no login (spec.md §6).
    pub storage_url: Option<String>,

    /// Required when `storage_url` is set; minimum length 32.
    pub token_signing_secret: Option<String>,

    /// Direct-peer allowlist for honoring forwarded-for headers.
    pub trusted_proxy_ips: Vec<String>,

    /// Optional shared rate-limit backend.
    pub rate_limit_storage_url: Option<String>,

    pub sync_threshold: u64,
    pub worker_poll: Duration,
    pub cleanup_every_n_loops: u64,
    pub job_retention_days: u32,
    pub evidence_retention_months: Option<u32>,
    pub match_threshold: u32,
    pub suggestion_threshold: u32,
    pub matcher_deadline: Duration,
    pub validity_days: i64,

    pub internal_api_key: Option<String>,
    pub internal_ip_allowlist: Vec<String>,
}

impl Config {
    /// Loads configuration from the process environment. Never panics on a
    /// missing optional variable; panics only when a *set* variable cannot
    /// be parsed, surfacing a misconfiguration immediately at startup
    /// rather than silently falling back.
    pub fn from_env() -> Self {
        let worker_poll_seconds = env_parse("WORKER_POLL_SECONDS", 5u64).max(2);

        Self {
            storage_url: env_opt("STORAGE_URL"),
            token_signing_secret: env_opt("TOKEN_SIGNING_SECRET"),
            trusted_proxy_ips: env_csv("TRUSTED_PROXY_IPS"),
            rate_limit_storage_url: env_opt("RATE_LIMIT_STORAGE_URL"),
            sync_threshold: env_parse("SYNC_THRESHOLD", 5),
            worker_poll: Duration::from_secs(worker_poll_seconds),
            cleanup_every_n_loops: env_parse("CLEANUP_EVERY_N_LOOPS", 50),
            job_retention_days: env_parse("JOB_RETENTION_DAYS", 7),
            evidence_retention_months: env_opt("EVIDENCE_RETENTION_MONTHS")
                .map(|v| v.parse().expect("EVIDENCE_RETENTION_MONTHS must be a number")),
            match_threshold: env_parse("MATCH_THRESHOLD", 75),
            suggestion_threshold: env_parse("SUGGESTION_THRESHOLD", 60),
            matcher_deadline: Duration::from_secs(env_parse("MATCHER_DEADLINE_SECONDS", 30)),
            validity_days: env_parse("VALIDITY_DAYS", 365),
            internal_api_key: env_opt("INTERNAL_API_KEY"),
            internal_ip_allowlist: env_csv("INTERNAL_IP_ALLOWLIST"),
        }
    }

    pub fn persistence_enabled(&self) -> bool {
        self.storage_url.is_some()
    }

    /// The internal bulk API is disabled (503) unless at least one
    /// authorization mechanism is configured (spec.md §6).
    pub fn internal_api_enabled(&self) -> bool {
        self.internal_api_key.is_some() || !self.internal_ip_allowlist.is_empty()
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_csv(key: &str) -> Vec<String> {
    env_opt(key)
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env_opt(key) {
        Some(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid {}", std::any::type_name::<T>())),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env_give_inline_mode() {
        // Does not touch process env; relies on these vars being unset in
        // the test harness. Defaults mirror spec.md §6 exactly.
        let cfg = Config {
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
        };
        assert!(!cfg.persistence_enabled());
        assert!(!cfg.internal_api_enabled());
        assert_eq!(cfg.worker_poll, Duration::from_secs(5));
    }

    #[test]
    fn env_csv_splits_and_trims() {
        std::env::set_var("OPCHECK_TEST_CSV", "10.0.0.1, 10.0.0.2,  10.0.0.3");
        assert_eq!(
            env_csv("OPCHECK_TEST_CSV"),
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]
        );
        std::env::remove_var("OPCHECK_TEST_CSV");
    }
}
