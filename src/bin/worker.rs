//! opcheck-worker — standalone job-queue worker (spec.md §4.6), for
//! deployments that run workers out-of-process from `opcheck-server`.
//! Shares the same env-driven `Config` and Postgres wiring; runs until
//! interrupted.

use std::sync::Arc;

use opcheck::ports::{AuditSink, Matcher};
use opcheck::{Config, Worker};
use opcheck_matcher::{PostgresWatchlistSource, RealMatcher};
use opcheck_postgres::PgStores;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opcheck=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let database_url = config
        .storage_url
        .clone()
        .expect("STORAGE_URL must be set to run opcheck-worker");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to database");
    tracing::info!("connected to database");

    let stores = PgStores::new(pool.clone());
    let es = Arc::new(stores.evidence.with_validity_days(config.validity_days));
    let jq = Arc::new(stores.jobs);
    let audit: Arc<dyn AuditSink> = Arc::new(opcheck::audit::BestEffort::new(stores.audit));
    let watchlist = Arc::new(PostgresWatchlistSource::new(pool));
    let matcher: Arc<dyn Matcher> = Arc::new(RealMatcher::with_thresholds(
        watchlist,
        config.match_threshold,
        config.suggestion_threshold,
    ));

    let worker = Worker::new(es, jq, matcher, audit, config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
}
