//! `GET /health` — plain-text liveness probe (spec.md §6).

pub async fn health() -> &'static str {
    "ok"
}
