use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use bytes::Bytes;
use tracing::{debug, info};

use crate::dto::{
    CreateOrderRequest, CreateOrderResponse, PaymentDetailsResponse, VerifyPaymentRequest,
    VerifyPaymentResponse,
};
use crate::errors::ServiceError;
use crate::middleware_helpers::{request_fingerprint, IDEMPOTENCY_KEY_HEADER};
use crate::services::orders::OrderHandle;
use crate::AppState;

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ServiceError> {
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid JSON body: {e}")))
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl From<OrderHandle> for CreateOrderResponse {
    fn from(handle: OrderHandle) -> Self {
        Self {
            success: true,
            key: handle.key,
            order_id_alias: handle.order_id.clone(),
            order_id: handle.order_id,
            amount: handle.amount,
            currency: handle.currency,
            receipt: handle.receipt,
            notes: handle.notes,
            booking_id: handle.booking_id,
            pricing: handle.pricing,
        }
    }
}

/// Create a gateway order for a booking
#[utoipa::path(
    post,
    path = "/create-order",
    request_body = CreateOrderRequest,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Replays the first response for repeated submissions")
    ),
    responses(
        (status = 200, description = "Order created", body = CreateOrderResponse,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))
        ),
        (status = 400, description = "Invalid amount or booking", body = crate::errors::ErrorResponse),
        (status = 409, description = "Idempotency key reused or booking already settled", body = crate::errors::ErrorResponse),
        (status = 500, description = "Gateway error", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreateOrderResponse>, ServiceError> {
    let key = idempotency_key(&headers);
    let fingerprint = request_fingerprint(&body);

    if let Some(key) = key.as_deref() {
        if let Some(previous) = state.idempotency.lookup(key, &fingerprint)? {
            info!(idempotency_key = key, order_id = %previous.order_id, "replaying order");
            return Ok(Json(previous));
        }
    }

    let request: CreateOrderRequest = parse_body(&body)?;
    let currency = request.currency_or(&state.config.default_currency);
    debug!(currency, "create order request received");

    let handle = state
        .orders
        .create_order(request.amount, currency, request.booking_data.as_ref())
        .await?;
    let response = CreateOrderResponse::from(handle);

    if let Some(key) = key.as_deref() {
        state
            .idempotency
            .store(key, fingerprint, response.clone());
    }

    Ok(Json(response))
}

/// Verify a checkout callback signature
#[utoipa::path(
    post,
    path = "/verify-payment",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified", body = VerifyPaymentResponse),
        (status = 400, description = "Missing parameters or invalid signature", body = crate::errors::ErrorResponse),
        (status = 409, description = "Booking cannot be confirmed with this payment", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal error", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<VerifyPaymentResponse>, ServiceError> {
    let request: VerifyPaymentRequest = parse_body(&body)?;

    let verified = state
        .orders
        .verify_payment(
            request.razorpay_order_id.as_deref().unwrap_or_default(),
            request.razorpay_payment_id.as_deref().unwrap_or_default(),
            request.razorpay_signature.as_deref().unwrap_or_default(),
            request.booking_data.as_ref(),
        )
        .await?;

    let booking_id = verified
        .booking
        .as_ref()
        .map(|b| b.reference.as_str().to_string())
        .or_else(|| {
            request
                .booking_data
                .as_ref()
                .and_then(|b| b.booking_id.clone())
        });

    Ok(Json(VerifyPaymentResponse {
        success: true,
        message: "Payment verified successfully".to_string(),
        payment_id: verified.verification.payment_id,
        order_id: verified.verification.order_id,
        booking_id,
        booking_status: verified.booking.map(|b| b.status),
    }))
}

/// Fetch a payment from the gateway
#[utoipa::path(
    get,
    path = "/payment/{paymentId}",
    params(("paymentId" = String, Path, description = "Gateway payment id")),
    responses(
        (status = 200, description = "Payment details", body = PaymentDetailsResponse),
        (status = 400, description = "Malformed payment id", body = crate::errors::ErrorResponse),
        (status = 500, description = "Gateway lookup failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentDetailsResponse>, ServiceError> {
    let payment = state.orders.payment_details(&payment_id).await?;
    Ok(Json(PaymentDetailsResponse {
        success: true,
        payment,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn blank_idempotency_key_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static("   "));
        assert_eq!(idempotency_key(&headers), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static(" attempt-1 "));
        assert_eq!(idempotency_key(&headers).as_deref(), Some("attempt-1"));
    }

    #[test]
    fn malformed_json_is_a_bad_request() {
        let err = parse_body::<CreateOrderRequest>(b"{not json").unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }
}
