//! Shared domain and wire types for the screening dispatch engine.
//!
//! This crate is the single source of truth for every boundary: the
//! Postgres row shapes (behind the `database` feature), the internal
//! domain model shared by the dispatcher/worker/refresh coordinator, and
//! the frozen wire contract in `wire`.

pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod ports;
pub mod reason;
pub mod wire;

pub use domain::*;
pub use fingerprint::EntityFingerprint;
pub use reason::ReasonForCheck;
