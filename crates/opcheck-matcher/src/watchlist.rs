//! The `WatchlistSource` read port: a handle over the current watchlist
//! snapshot (spec.md §4.5 — "a read handle over the current watchlist
//! snapshot"). Watchlist ingestion (downloading the upstream dataset) is out
//! of scope (spec.md §1); this crate only consumes rows through this port.

use async_trait::async_trait;
use chrono::NaiveDate;
use opcheck_types::domain::{EntityType, Regime};
use opcheck_types::error::Result;

/// One watchlist row as seen by the Matcher: a name, an optional DOB, and
/// the regime that lists it. Sanctions rows and PEP rows share this shape;
/// the two passes (spec.md §4.5) are distinguished by which method returned
/// the row, not by a field on the row itself.
#[derive(Debug, Clone)]
pub struct WatchlistRow {
    pub subject_id: String,
    pub subject_name: String,
    pub entity_type: EntityType,
    pub dob: Option<NaiveDate>,
    pub regime: Regime,
}

/// Read-only handle over a watchlist snapshot. Candidate filtering by
/// `entity_type` (spec.md §4.5) is pushed down to the implementation so a
/// Postgres-backed source can filter at the query rather than in memory.
#[async_trait]
pub trait WatchlistSource: Send + Sync {
    async fn sanctions_candidates(&self, entity_type: EntityType) -> Result<Vec<WatchlistRow>>;

    async fn pep_candidates(&self, entity_type: EntityType) -> Result<Vec<WatchlistRow>>;
}

/// An in-memory snapshot, primarily for tests and the inline-only deployment
/// mode where no Postgres watchlist table is configured.
pub struct StaticWatchlist {
    pub sanctions: Vec<WatchlistRow>,
    pub peps: Vec<WatchlistRow>,
}

#[async_trait]
impl WatchlistSource for StaticWatchlist {
    async fn sanctions_candidates(&self, entity_type: EntityType) -> Result<Vec<WatchlistRow>> {
        Ok(self
            .sanctions
            .iter()
            .filter(|r| r.entity_type == entity_type)
            .cloned()
            .collect())
    }

    async fn pep_candidates(&self, entity_type: EntityType) -> Result<Vec<WatchlistRow>> {
        Ok(self
            .peps
            .iter()
            .filter(|r| r.entity_type == entity_type)
            .cloned()
            .collect())
    }
}
