/*!
 * # Health Check Module
 *
 * - Service index (`/`) - what is running and which endpoints it serves
 * - Basic health check (`/health`) - always up while the process answers
 */

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::AppState;

pub const ENDPOINTS: &[&str] = &[
    "/",
    "/health",
    "/create-order",
    "/verify-payment",
    "/payment/:paymentId",
    "/webhook",
    "/api-docs/openapi.json",
];

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIndex {
    pub message: String,
    pub timestamp: String,
    /// `Present` or `Missing`; the key itself is never echoed here
    pub razorpay_key_id: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime_seconds: u64,
}

/// Service banner
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service index", body = ServiceIndex)),
    tag = "Health"
)]
pub async fn service_index(State(state): State<AppState>) -> impl IntoResponse {
    let key_status = if state.config.razorpay_key_id.trim().is_empty() {
        "Missing"
    } else {
        "Present"
    };

    Json(ServiceIndex {
        message: "Homestay payments backend is running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        razorpay_key_id: key_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    })
}

/// Basic health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    debug!("Health check endpoint called");

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
        }),
    )
}
