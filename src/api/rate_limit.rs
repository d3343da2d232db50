//! Rate-limit middleware for the public screening endpoint (spec.md §4.9).
//! Resolves the client IP via `client_ip::resolve` and checks it against
//! the shared `RateGovernor`, the same `axum::middleware::from_fn` +
//! `Extension` shape the teacher's `jwt_auth` uses.

use axum::extract::{ConnectInfo, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::net::SocketAddr;

use crate::api::client_ip;
use crate::api::state::AppState;
use crate::rate_governor::Admission;

pub async fn enforce(req: Request, next: Next) -> Result<Response, Response> {
    let state = req
        .extensions()
        .get::<AppState>()
        .cloned()
        .ok_or_else(|| internal_error("app state not initialized"))?;

    let connect_info = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .cloned()
        .ok_or_else(|| internal_error("missing connection info"))?;

    let ip = client_ip::resolve(req.headers(), &connect_info, &state.config.trusted_proxy_ips);

    match state.rate_governor.check_screen(ip) {
        Admission::Allowed => Ok(next.run(req).await),
        Admission::Exceeded { retry_after } => {
            let retry_after_secs = retry_after.as_secs().max(1);
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": format!("rate limited, retry after {retry_after_secs}s"),
                    "code": 429,
                })),
            )
                .into_response();
            response.headers_mut().insert(
                "Retry-After",
                retry_after_secs.to_string().parse().unwrap(),
            );
            Err(response)
        }
    }
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": message})),
    )
        .into_response()
}
