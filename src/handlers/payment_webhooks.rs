use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use tracing::{error, info, warn};

use crate::errors::ServiceError;
use crate::webhooks::{Dispatch, WebhookOutcome, EVENT_ID_HEADER, SIGNATURE_HEADER};
use crate::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// POST /webhook
#[utoipa::path(
    post,
    path = "/webhook",
    request_body(content = String, description = "Raw gateway event JSON", content_type = "application/json"),
    params(
        ("x-razorpay-signature" = Option<String>, Header, description = "HMAC-SHA256 of the raw body"),
        ("x-razorpay-event-id" = Option<String>, Header, description = "Delivery id used for de-duplication")
    ),
    responses(
        (status = 200, description = "Webhook accepted", body = String),
        (status = 400, description = "Invalid signature", body = String),
        (status = 500, description = "Processing error", body = String)
    ),
    tag = "Webhooks"
)]
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = header(&headers, SIGNATURE_HEADER);
    let event_id = header(&headers, EVENT_ID_HEADER);

    match state.webhooks.process(&body, signature, event_id).await {
        Ok(WebhookOutcome::Unverified) => {
            (StatusCode::OK, "Webhook received but not verified")
        }
        Ok(WebhookOutcome::Duplicate) => (StatusCode::OK, "Webhook processed"),
        Ok(WebhookOutcome::Processed(dispatch)) => {
            match &dispatch {
                Dispatch::BookingConfirmed { booking_id } => {
                    info!(booking_id = %booking_id, "webhook confirmed booking")
                }
                Dispatch::Skipped { reason } => info!(reason = %reason, "webhook not applied"),
                _ => {}
            }
            (StatusCode::OK, "Webhook processed")
        }
        Err(ServiceError::WebhookSignatureInvalid) => {
            warn!("webhook signature verification failed");
            (StatusCode::BAD_REQUEST, "Invalid signature")
        }
        Err(e) => {
            error!(error = %e, "webhook processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Webhook processing error")
        }
    }
}
