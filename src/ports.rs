//! Storage and collaborator port traits (spec.md §4.2–§4.5, §4.10).
//!
//! The traits themselves live in `opcheck_types::ports` — that is what lets
//! `opcheck-matcher` implement `Matcher` and `opcheck-postgres` implement
//! `EvidenceStore`/`JobQueue`/`AuditSink` without either depending back on
//! this binary crate. Re-exported here so the rest of the root crate can
//! write `crate::ports::EvidenceStore` as if the traits were local,
//! mirroring the teacher's `sem_os_core::ports` / `sem_os_postgres` split.

pub use opcheck_types::ports::{
    AuditEvent, AuditSink, EvidenceStore, FallibleAuditSink, JobQueue, Matcher,
};
