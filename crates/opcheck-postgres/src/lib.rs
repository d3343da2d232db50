//! PostgreSQL adapters for the screening engine's storage ports (spec.md
//! §4.2, §4.3, §4.7, §4.10). Mirrors the teacher's `sem_os_postgres` crate:
//! one `Pg*` struct per port, each wrapping a cloned `sqlx::PgPool`, plus a
//! `PgStores` convenience bundle that constructs all of them from a single
//! pool. Every query is runtime-checked (`sqlx::query`/`query_as`, not the
//! `query!` macros) since the schema in `migrations/` may not exist at
//! compile time in every build environment.

pub mod audit_store;
pub mod evidence_store;
pub mod job_queue;
pub mod refresh_run_store;

pub use audit_store::PgAuditSink;
pub use evidence_store::PgEvidenceStore;
pub use job_queue::PgJobQueue;
pub use refresh_run_store::PgRefreshRunStore;

use sqlx::PgPool;

/// Constructs every Postgres adapter from one pool, the way the teacher's
/// `PgStores` does.
pub struct PgStores {
    pub evidence: PgEvidenceStore,
    pub jobs: PgJobQueue,
    pub audit: PgAuditSink,
    pub refresh_runs: PgRefreshRunStore,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            evidence: PgEvidenceStore::new(pool.clone()),
            jobs: PgJobQueue::new(pool.clone()),
            audit: PgAuditSink::new(pool.clone()),
            refresh_runs: PgRefreshRunStore::new(pool),
        }
    }
}
