//! Rate Governor (spec.md §4.9): per-client-IP token buckets enforced in
//! the dispatch path, plus per-account login backoff. Grounded on the
//! teacher's `middleware::rate_limit` sliding-window-with-burst limiter,
//! generalized to a second keyspace (account id) with fixed thresholds
//! instead of a uniform window.

use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sliding-window-with-burst token bucket, generic over the key type so the
/// same primitive backs both IP-keyed screening-endpoint limits and
/// account-keyed login backoff.
struct Bucket<K> {
    max_requests: u32,
    window: Duration,
    burst: u32,
    state: Mutex<HashMap<K, Entry>>,
}

struct Entry {
    count: u32,
    window_start: Instant,
}

pub enum Admission {
    Allowed,
    Exceeded { retry_after: Duration },
}

impl<K: Eq + Hash + Clone> Bucket<K> {
    fn new(max_requests: u32, window: Duration, burst: u32) -> Self {
        Self {
            max_requests,
            window,
            burst,
            state: Mutex::new(HashMap::new()),
        }
    }

    fn check(&self, key: K) -> Admission {
        let mut state = self.state.lock();
        let now = Instant::now();

        let entry = state.entry(key).or_insert(Entry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        let limit = self.max_requests + self.burst;
        let reset_at = entry.window_start + self.window;

        if entry.count > limit {
            Admission::Exceeded {
                retry_after: reset_at.saturating_duration_since(now),
            }
        } else {
            Admission::Allowed
        }
    }

    fn cleanup(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let window = self.window;
        state.retain(|_, entry| now.duration_since(entry.window_start) < window * 2);
    }
}

/// Per-client-IP token bucket guarding the screening endpoint (spec.md
/// §4.4/§4.9). The trusted-peer/forwarded-header resolution happens at the
/// call site (the axum extractor), not here — this type only tracks counts.
pub struct RateGovernor {
    screen: Bucket<IpAddr>,
    login: LoginBackoff,
}

impl RateGovernor {
    pub fn new(max_requests: u32, window: Duration, burst: u32) -> Self {
        Self {
            screen: Bucket::new(max_requests, window, burst),
            login: LoginBackoff::new(),
        }
    }

    pub fn check_screen(&self, ip: IpAddr) -> Admission {
        self.screen.check(ip)
    }

    pub fn login_backoff(&self) -> &LoginBackoff {
        &self.login
    }

    pub fn cleanup(&self) {
        self.screen.cleanup();
        self.login.cleanup();
    }
}

/// Per-account login backoff: fixed thresholds in a 15-minute sliding
/// window (spec.md §4.9) rather than a uniform request-rate window.
/// 5 failures → 30s, 8 → 2min, 10+ → 10min.
pub struct LoginBackoff {
    state: Mutex<HashMap<String, LoginEntry>>,
}

struct LoginEntry {
    failures: u32,
    window_start: Instant,
}

const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

impl LoginBackoff {
    fn new() -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Call on every failed login attempt. Returns the backoff hint that
    /// applies to the *next* attempt, or `None` if the account is not yet
    /// throttled.
    pub fn record_failure(&self, account_id: &str) -> Option<Duration> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let entry = state
            .entry(account_id.to_string())
            .or_insert(LoginEntry {
                failures: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= LOGIN_WINDOW {
            entry.failures = 0;
            entry.window_start = now;
        }
        entry.failures += 1;
        backoff_for(entry.failures)
    }

    /// Call on a successful login to clear the account's failure count.
    pub fn clear(&self, account_id: &str) {
        self.state.lock().remove(account_id);
    }

    fn cleanup(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.retain(|_, entry| now.duration_since(entry.window_start) < LOGIN_WINDOW * 2);
    }
}

fn backoff_for(failures: u32) -> Option<Duration> {
    if failures >= 10 {
        Some(Duration::from_secs(10 * 60))
    } else if failures >= 8 {
        Some(Duration::from_secs(2 * 60))
    } else if failures >= 5 {
        Some(Duration::from_secs(30))
    } else {
        None
    }
}

pub fn shared(max_requests: u32, window: Duration, burst: u32) -> Arc<RateGovernor> {
    Arc::new(RateGovernor::new(max_requests, window, burst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_under_limit() {
        let governor = RateGovernor::new(10, Duration::from_secs(60), 5);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        for _ in 0..10 {
            assert!(matches!(governor.check_screen(ip), Admission::Allowed));
        }
    }

    #[test]
    fn exceeds_after_limit_and_burst() {
        let governor = RateGovernor::new(5, Duration::from_secs(60), 3);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        for _ in 0..8 {
            assert!(matches!(governor.check_screen(ip), Admission::Allowed));
        }
        assert!(matches!(
            governor.check_screen(ip),
            Admission::Exceeded { .. }
        ));
    }

    #[test]
    fn login_backoff_thresholds() {
        let backoff = LoginBackoff::new();
        for _ in 0..4 {
            assert_eq!(backoff.record_failure("user-1"), None);
        }
        assert_eq!(backoff.record_failure("user-1"), Some(Duration::from_secs(30)));
        for _ in 0..2 {
            backoff.record_failure("user-1");
        }
        assert_eq!(
            backoff.record_failure("user-1"),
            Some(Duration::from_secs(2 * 60))
        );
        for _ in 0..2 {
            backoff.record_failure("user-1");
        }
        assert_eq!(
            backoff.record_failure("user-1"),
            Some(Duration::from_secs(10 * 60))
        );
    }

    #[test]
    fn login_backoff_clears_on_success() {
        let backoff = LoginBackoff::new();
        for _ in 0..5 {
            backoff.record_failure("user-2");
        }
        backoff.clear("user-2");
        assert_eq!(backoff.record_failure("user-2"), None);
    }
}
