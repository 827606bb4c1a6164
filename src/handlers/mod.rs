pub mod payment_webhooks;
pub mod payments;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

/// Payment handshake routes, mounted at the root as the checkout page expects.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(payments::create_order))
        .route("/verify-payment", post(payments::verify_payment))
        .route("/payment/:payment_id", get(payments::get_payment))
        .route("/webhook", post(payment_webhooks::razorpay_webhook))
}
