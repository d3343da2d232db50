//! `PostgresWatchlistSource`: a `WatchlistSource` backed by a materialized
//! watchlist snapshot table. Watchlist ingestion itself (downloading the
//! upstream dataset and populating this table) is out of scope (spec.md
//! §1) — this adapter only reads rows the ingestion pipeline already wrote,
//! the same "read through a port, don't own the write path" split the
//! teacher draws between `ob-semantic-matcher`'s resolver and whatever
//! populates its source tables.

use async_trait::async_trait;
use chrono::NaiveDate;
use opcheck_types::domain::{EntityType, Regime};
use opcheck_types::error::{Result, ScreeningError};
use sqlx::PgPool;

use crate::watchlist::{WatchlistRow, WatchlistSource};

fn db_err(e: sqlx::Error) -> ScreeningError {
    ScreeningError::MatcherUnavailable(e.to_string())
}

fn parse_regime(label: &str) -> Option<Regime> {
    match label {
        "UN" => Some(Regime::Un),
        "OFAC" => Some(Regime::Ofac),
        "HM Treasury" | "HMT" | "OFSI" => Some(Regime::HmTreasury),
        "EU Council" | "EU Financial Sanctions" => Some(Regime::EuCouncil),
        "Consolidated PEP List" => Some(Regime::ConsolidatedPep),
        _ => None,
    }
}

pub struct PostgresWatchlistSource {
    pool: PgPool,
}

impl PostgresWatchlistSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn candidates(
        &self,
        entity_type: EntityType,
        peps_only: bool,
    ) -> Result<Vec<WatchlistRow>> {
        let rows = sqlx::query_as::<_, (String, String, String, Option<NaiveDate>, String)>(
            r#"
            SELECT subject_id, subject_name, entity_type, date_of_birth, regime
            FROM opcheck.watchlist_rows
            WHERE entity_type = $1 AND is_pep = $2
            "#,
        )
        .bind(entity_type.as_str())
        .bind(peps_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|(subject_id, subject_name, entity_type_str, dob, regime_label)| {
                let entity_type = entity_type_str.parse().ok()?;
                let regime = parse_regime(&regime_label)?;
                Some(WatchlistRow {
                    subject_id,
                    subject_name,
                    entity_type,
                    dob,
                    regime,
                })
            })
            .collect())
    }
}

#[async_trait]
impl WatchlistSource for PostgresWatchlistSource {
    async fn sanctions_candidates(&self, entity_type: EntityType) -> Result<Vec<WatchlistRow>> {
        self.candidates(entity_type, false).await
    }

    async fn pep_candidates(&self, entity_type: EntityType) -> Result<Vec<WatchlistRow>> {
        self.candidates(entity_type, true).await
    }
}
