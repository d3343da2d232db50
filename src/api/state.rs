//! Shared application state, injected via `Extension` at every handler —
//! the same `Extension(service)` pattern the teacher's router uses for
//! `Arc<dyn CoreService>`, generalized to the several collaborators this
//! engine's handlers need.

use std::sync::Arc;

use opcheck_matcher::WatchlistSource;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, ScreeningError};
use crate::ports::{EvidenceStore, JobQueue};
use crate::rate_governor::RateGovernor;
use crate::refresh::RefreshCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// `None` in inline-only mode (spec.md §6 — no `StorageUrl` configured).
    pub es: Option<Arc<dyn EvidenceStore>>,
    pub jq: Option<Arc<dyn JobQueue>>,
    pub refresh: Option<Arc<RefreshCoordinator>>,
    /// The same watchlist snapshot handle the Matcher reads through,
    /// shared here so the refresh-trigger endpoint can compute the UK hash
    /// it needs without a second connection to the ingestion pipeline.
    pub watchlist: Option<Arc<dyn WatchlistSource>>,
    pub rate_governor: Arc<RateGovernor>,
    pub config: Config,
}

impl AppState {
    pub fn require_es(&self) -> Result<&Arc<dyn EvidenceStore>> {
        self.es
            .as_ref()
            .ok_or_else(|| ScreeningError::StoreUnavailable("persistence not configured".into()))
    }

    pub fn require_jq(&self) -> Result<&Arc<dyn JobQueue>> {
        self.jq
            .as_ref()
            .ok_or_else(|| ScreeningError::StoreUnavailable("persistence not configured".into()))
    }

    pub fn require_refresh(&self) -> Result<&Arc<RefreshCoordinator>> {
        self.refresh
            .as_ref()
            .ok_or_else(|| ScreeningError::StoreUnavailable("persistence not configured".into()))
    }

    pub fn require_watchlist(&self) -> Result<&Arc<dyn WatchlistSource>> {
        self.watchlist
            .as_ref()
            .ok_or_else(|| ScreeningError::StoreUnavailable("persistence not configured".into()))
    }
}
