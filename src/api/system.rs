//! Root, health and favicon routes.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub price_cents: i64,
}

/// GET / - Service banner.
pub async fn root() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "picklepot-backend",
        "try": ["/health", "/create-pot-session", "/create-checkout-session", "/webhook"],
    }))
}

/// GET /health and /healthz
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        price_cents: state.config.pot_create_price_cents,
    })
}

pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}
