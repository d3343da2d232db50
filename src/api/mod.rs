//! The Axum HTTP surface (spec.md §6), gated behind the `server` feature.
//! Each module is a thin translation layer over the Dispatcher/ports —
//! handlers parse the request, call into domain logic, and map the result
//! onto the frozen wire contract in `opcheck_types::wire`.

pub mod admin;
pub mod auth;
pub mod bulk;
pub mod client_ip;
pub mod evidence;
pub mod health;
pub mod jobs;
pub mod rate_limit;
pub mod refresh;
pub mod review;
pub mod router;
pub mod screen;
pub mod state;

pub use router::build_router;
pub use state::AppState;
