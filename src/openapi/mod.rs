use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Homestay Payments API",
        version = "1.0.0",
        description = r#"
# Homestay Payments API

Server side of the booking site's payment handshake with Razorpay.

## Flow

1. `POST /create-order` prices the booking and opens a gateway order.
2. The browser completes checkout in the gateway modal.
3. `POST /verify-payment` checks the callback signature and confirms the booking.
4. Razorpay delivers `payment.captured`, `payment.failed` and `order.paid` to `POST /webhook`.

## Amounts

Request amounts are rupees. Response amounts are paisa (1/100 rupee), as the gateway reports them.

## Error Handling

Failing JSON endpoints answer with:

```json
{
  "success": false,
  "message": "Invalid amount provided",
  "request_id": "8a3b...",
  "timestamp": "2025-01-01T00:00:00Z"
}
```
"#
    ),
    paths(
        crate::health::service_index,
        crate::health::health_check,
        crate::handlers::payments::create_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::payments::get_payment,
        crate::handlers::payment_webhooks::razorpay_webhook,
    ),
    components(
        schemas(
            crate::dto::CreateOrderRequest,
            crate::dto::CreateOrderResponse,
            crate::dto::VerifyPaymentRequest,
            crate::dto::VerifyPaymentResponse,
            crate::dto::PaymentDetailsResponse,
            crate::models::booking::BookingData,
            crate::models::booking::BookingStatus,
            crate::models::payment::PaymentSummary,
            crate::services::pricing::PriceBreakdown,
            crate::services::pricing::PricedLineItem,
            crate::services::menu::MenuItem,
            crate::services::menu::MenuCategory,
            crate::errors::ErrorResponse,
            crate::health::ServiceIndex,
            crate::health::HealthResponse,
        )
    ),
    tags(
        (name = "Payments", description = "Order creation, verification and lookup"),
        (name = "Webhooks", description = "Gateway event delivery"),
        (name = "Health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

pub fn openapi_json() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .unwrap_or_else(|_| "{}".to_string())
}

pub fn swagger_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_payment_paths() {
        let doc = ApiDoc::openapi();
        for path in ["/create-order", "/verify-payment", "/payment/{paymentId}", "/webhook"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        assert!(openapi_json().contains("Homestay Payments API"));
    }
}
