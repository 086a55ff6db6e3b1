//! Health check endpoint for load balancers and monitoring.
//!
//! Returns 200 OK if the capping store is reachable,
//! 503 Service Unavailable otherwise.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store: bool,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = match state.engine.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = ?err, "capping store health check failed");
            false
        }
    };

    let response = HealthResponse {
        status: if store_ok { "ok" } else { "unhealthy" },
        store: store_ok,
    };

    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
