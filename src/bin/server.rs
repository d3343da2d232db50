//! opcheck-server — HTTP front door plus in-process workers.
//!
//! Reads config from env vars via `opcheck::Config::from_env`. When
//! `STORAGE_URL` is unset the server runs in inline-only mode (spec.md §6):
//! no cache, no queue, no workers, every screen decided synchronously
//! against the watchlist.

use std::net::SocketAddr;
use std::sync::Arc;

use opcheck::api::build_router;
use opcheck::api::state::AppState;
use opcheck::ports::{AuditSink, EvidenceStore, JobQueue, Matcher};
use opcheck::{rate_governor, Config, Dispatcher, RefreshCoordinator, Worker};
use opcheck_matcher::watchlist::StaticWatchlist;
use opcheck_matcher::{PostgresWatchlistSource, RealMatcher, WatchlistSource};
use opcheck_postgres::PgStores;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// In-process worker count when persistence is configured. A standalone
/// deployment would instead run `opcheck-worker` out-of-process; this pool
/// is for the common single-binary deployment (spec.md §6).
const IN_PROCESS_WORKERS: usize = 2;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opcheck=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".into())
        .parse()
        .expect("BIND_ADDR must be a valid socket address");

    let mut es: Option<Arc<dyn EvidenceStore>> = None;
    let mut jq: Option<Arc<dyn JobQueue>> = None;
    let mut refresh: Option<Arc<RefreshCoordinator>> = None;
    let mut watchlist: Option<Arc<dyn WatchlistSource>> = None;
    let mut audit: Arc<dyn AuditSink> = opcheck::audit::default_sink();

    if let Some(database_url) = config.storage_url.clone() {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .expect("failed to connect to database");
        sqlx::migrate!("crates/opcheck-postgres/migrations")
            .run(&pool)
            .await
            .expect("failed to run migrations");
        tracing::info!("connected to database");

        let stores = PgStores::new(pool.clone());
        let evidence: Arc<dyn EvidenceStore> = Arc::new(
            stores
                .evidence
                .with_validity_days(config.validity_days),
        );
        let jobs: Arc<dyn JobQueue> = Arc::new(stores.jobs);
        let audit_sink: Arc<dyn AuditSink> =
            Arc::new(opcheck::audit::BestEffort::new(stores.audit));
        let run_store = Arc::new(stores.refresh_runs);
        let watchlist_source: Arc<dyn WatchlistSource> =
            Arc::new(PostgresWatchlistSource::new(pool.clone()));

        refresh = Some(Arc::new(RefreshCoordinator::new(
            evidence.clone(),
            jobs.clone(),
            run_store,
            audit_sink.clone(),
        )));
        es = Some(evidence);
        jq = Some(jobs);
        audit = audit_sink;
        watchlist = Some(watchlist_source);
    }

    let matcher: Arc<dyn Matcher> = match &watchlist {
        Some(w) => Arc::new(RealMatcher::with_thresholds(
            w.clone(),
            config.match_threshold,
            config.suggestion_threshold,
        )),
        None => Arc::new(RealMatcher::with_thresholds(
            Arc::new(StaticWatchlist {
                sanctions: vec![],
                peps: vec![],
            }),
            config.match_threshold,
            config.suggestion_threshold,
        )),
    };

    let store = match (&es, &jq) {
        (Some(es), Some(jq)) => Some((es.clone(), jq.clone())),
        _ => None,
    };

    let dispatcher = Arc::new(Dispatcher::new(
        store,
        matcher.clone(),
        audit.clone(),
        config.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    if let (Some(es), Some(jq)) = (es.clone(), jq.clone()) {
        for worker_id in 0..IN_PROCESS_WORKERS {
            let worker = Worker::new(
                es.clone(),
                jq.clone(),
                matcher.clone(),
                audit.clone(),
                config.clone(),
            );
            let rx = shutdown_rx.clone();
            tokio::spawn(async move {
                tracing::info!(worker_id, "in-process worker started");
                worker.run(rx).await;
            });
        }
    }

    let state = AppState {
        dispatcher,
        es,
        jq,
        refresh,
        watchlist,
        rate_governor: rate_governor::shared(100, std::time::Duration::from_secs(60), 20),
        config,
    };

    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {bind_addr}: {e}"));
    tracing::info!("opcheck-server listening on {bind_addr}");

    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    let _ = shutdown_tx.send(true);
}
