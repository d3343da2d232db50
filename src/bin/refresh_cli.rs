//! opcheck-refresh-cli — triggers one Refresh Coordinator run from the
//! command line (spec.md §4.7), for operators who want to kick off a
//! refresh without going through the internal HTTP endpoint.
//!
//! Computes the UK hash the same way the HTTP handler does: a sorted,
//! newline-joined, SHA-256'd list of UK-scoped (HM Treasury) subject ids
//! read through the `WatchlistSource` port.

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use opcheck::ports::AuditSink;
use opcheck::{Config, RefreshCoordinator};
use opcheck_matcher::PostgresWatchlistSource;
use opcheck_postgres::PgStores;
use opcheck_types::domain::EntityType;
use opcheck_types::wire::RefreshDelta;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "opcheck-refresh-cli", about = "Trigger one watchlist refresh run")]
struct Args {
    /// Skip the rescreen pass even if the UK hash changed (hash-comparison dry run).
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opcheck=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let database_url = config
        .storage_url
        .clone()
        .expect("STORAGE_URL must be set to run opcheck-refresh-cli");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to database");

    let stores = PgStores::new(pool.clone());
    let es = Arc::new(stores.evidence.with_validity_days(config.validity_days));
    let jq = Arc::new(stores.jobs);
    let audit: Arc<dyn AuditSink> = Arc::new(opcheck::audit::BestEffort::new(stores.audit));
    let run_store = Arc::new(stores.refresh_runs);
    let watchlist = PostgresWatchlistSource::new(pool);

    let (uk_hash, uk_row_count) = compute_uk_hash(&watchlist)
        .await
        .expect("failed to read watchlist for UK hash");

    if args.dry_run {
        println!("uk_hash={uk_hash} uk_row_count={uk_row_count} (dry run, no rescreen)");
        return;
    }

    let coordinator = RefreshCoordinator::new(es, jq, run_store, audit);
    let outcome = coordinator
        .run(
            uk_hash,
            uk_row_count,
            RefreshDelta {
                added: 0,
                removed: 0,
                changed: 0,
            },
            Utc::now(),
        )
        .await
        .expect("refresh run failed");

    println!(
        "run_id={} uk_changed={} candidates={} queued={} already_pending={} reused={} failed={}",
        outcome.run.run_id,
        outcome.uk_changed,
        outcome.rescreen.candidates,
        outcome.rescreen.queued,
        outcome.rescreen.already_pending,
        outcome.rescreen.reused,
        outcome.rescreen.failed,
    );
}

async fn compute_uk_hash(
    watchlist: &PostgresWatchlistSource,
) -> opcheck_types::error::Result<(String, i64)> {
    use opcheck_matcher::WatchlistSource;

    let mut subject_ids = Vec::new();
    for entity_type in [EntityType::Person, EntityType::Organization] {
        let rows = watchlist.sanctions_candidates(entity_type).await?;
        subject_ids.extend(
            rows.into_iter()
                .filter(|r| r.regime.is_uk_scoped())
                .map(|r| r.subject_id),
        );
    }
    subject_ids.sort();

    let mut hasher = Sha256::new();
    for id in &subject_ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    let hash = hex::encode(hasher.finalize());
    Ok((hash, subject_ids.len() as i64))
}
