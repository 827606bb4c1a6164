//! Homestay payments library
//!
//! Server side of the booking site's Razorpay handshake (order creation,
//! callback verification, webhooks) plus a typed client-side checkout flow.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod checkout;
pub mod config;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod models;
pub mod openapi;
pub mod services;
pub mod store;
pub mod tracing;
pub mod webhooks;

use std::sync::Arc;
use std::time::Instant;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::AppConfig;
use crate::dto::CreateOrderResponse;
use crate::middleware_helpers::IdempotencyStore;
use crate::services::gateway::{GatewayError, PaymentGateway, RazorpayGateway};
use crate::services::{MenuCatalog, OrderPolicy, OrderService, PricingCalculator, SignatureVerifier};
use crate::store::{BookingRecordStore, InMemoryBookingStore};
use crate::webhooks::WebhookProcessor;

/// Shared handler state. Everything in here is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orders: Arc<OrderService>,
    pub webhooks: Arc<WebhookProcessor>,
    pub store: Arc<dyn BookingRecordStore>,
    pub idempotency: IdempotencyStore<CreateOrderResponse>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires the services around an explicit gateway and booking store.
    pub fn new(
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn BookingRecordStore>,
    ) -> Self {
        let verifier = SignatureVerifier::new(
            config.razorpay_key_secret.clone(),
            config.webhook_secret().map(str::to_string),
        );
        let pricing = PricingCalculator::new(
            config.room_price(),
            config.tax_rate(),
            MenuCatalog::standard(),
        );
        let orders = OrderService::new(
            gateway,
            config.razorpay_key_id.clone(),
            pricing,
            verifier.clone(),
            store.clone(),
            OrderPolicy {
                require_priced_booking: config.require_priced_booking,
            },
        );
        let webhooks = WebhookProcessor::new(verifier, store.clone(), config.webhook_dedupe_ttl());

        Self {
            idempotency: IdempotencyStore::new(config.idempotency_ttl()),
            config: Arc::new(config),
            orders: Arc::new(orders),
            webhooks: Arc::new(webhooks),
            store,
            started_at: Instant::now(),
        }
    }

    /// Production wiring: Razorpay REST gateway and the in-process store.
    pub fn from_config(config: AppConfig) -> Result<Self, GatewayError> {
        let gateway = RazorpayGateway::new(
            config.razorpay_key_id.clone(),
            config.razorpay_key_secret.clone(),
            config.razorpay_api_base.clone(),
            config.gateway_timeout(),
        )?;
        ::tracing::info!(
            key_id = %gateway.key_id(),
            webhook_secret = config.webhook_secret().is_some(),
            "payment gateway configured"
        );
        Ok(Self::new(
            config,
            Arc::new(gateway),
            Arc::new(InMemoryBookingStore::new()),
        ))
    }
}

async fn endpoint_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "Endpoint not found",
        })),
    )
}

/// Full HTTP surface: health, payment routes, OpenAPI document, 404
/// fallback, request tracing and request ids. CORS is left to the binary.
pub fn app_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_size;

    Router::new()
        .route("/", get(health::service_index))
        .route("/health", get(health::health_check))
        .merge(handlers::payment_routes())
        .merge(openapi::swagger_routes())
        .fallback(endpoint_not_found)
        .layer(RequestBodyLimitLayer::new(body_limit))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
