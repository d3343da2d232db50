//! Router construction for the screening engine's HTTP surface. Shape is
//! the teacher's `sem_os_server::router::build_router`: a protected set of
//! routes layered with middleware, a public set that isn't, merged and
//! given shared state via one `Extension`.

use axum::{middleware as axum_mw, routing::get, routing::post, Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::state::AppState;
use super::{admin, bulk, evidence, health, jobs, rate_limit, refresh, review, screen};

pub fn build_router(state: AppState) -> Router {
    let screening = Router::new()
        .route("/opcheck", post(screen::screen))
        .layer(axum_mw::from_fn(rate_limit::enforce));

    let evidence_routes = Router::new()
        .route("/opcheck/evidence", get(evidence::search))
        .route("/opcheck/evidence/:fp", get(evidence::get_by_fingerprint))
        .route("/opcheck/jobs/:job_id", get(jobs::get_job))
        .route(
            "/opcheck/evidence/:fp/review/claim",
            post(review::claim),
        )
        .route(
            "/opcheck/evidence/:fp/review/complete",
            post(review::complete),
        )
        .route(
            "/opcheck/evidence/:fp/review/false-positive",
            post(review::false_positive),
        );

    let internal = Router::new()
        .route("/opcheck/bulk", post(bulk::bulk_screen))
        .route("/refresh_opensanctions", post(refresh::trigger))
        .route("/admin/retention-sweep", post(admin::retention_sweep));

    let public = Router::new().route("/health", get(health::health));

    public
        .merge(screening)
        .merge(evidence_routes)
        .merge(internal)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
