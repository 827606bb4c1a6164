use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::pricing::PricingError;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": false,
    "message": "Invalid amount provided",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    /// Human-readable error description
    pub message: String,
    /// Upstream detail, only present for gateway failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid booking data: {0}")]
    InvalidBooking(String),

    #[error("Invalid stay: {0}")]
    InvalidStay(String),

    #[error("Unknown menu item: {0}")]
    UnknownMenuItem(String),

    #[error("Missing required payment verification parameters")]
    MissingVerificationParameters,

    #[error("Payment verification failed - invalid signature")]
    SignatureMismatch,

    #[error("Order creation failed: {0}")]
    OrderCreationFailed(String),

    #[error("Payment lookup failed: {0}")]
    PaymentLookupFailed(String),

    #[error("Invalid webhook signature")]
    WebhookSignatureInvalid,

    #[error("Webhook processing error: {0}")]
    WebhookProcessing(String),

    #[error("Booking state conflict: {0}")]
    BookingStateConflict(String),

    #[error("Idempotency conflict: {0}")]
    IdempotencyConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::InvalidBooking(err.to_string())
    }
}

impl From<PricingError> for ServiceError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::UnknownItem(id) => ServiceError::UnknownMenuItem(id),
            other => ServiceError::InvalidStay(other.to_string()),
        }
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidAmount(_)
            | Self::InvalidBooking(_)
            | Self::InvalidStay(_)
            | Self::UnknownMenuItem(_)
            | Self::MissingVerificationParameters
            | Self::SignatureMismatch
            | Self::WebhookSignatureInvalid
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BookingStateConflict(_) | Self::IdempotencyConflict(_) => StatusCode::CONFLICT,
            Self::OrderCreationFailed(_)
            | Self::PaymentLookupFailed(_)
            | Self::WebhookProcessing(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    pub fn response_message(&self) -> String {
        match self {
            Self::InvalidAmount(_) => "Invalid amount provided".to_string(),
            Self::OrderCreationFailed(_) => "Failed to create Razorpay order".to_string(),
            Self::PaymentLookupFailed(_) => "Failed to fetch payment details".to_string(),
            Self::WebhookProcessing(_) => "Webhook processing error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Upstream detail passed through to the caller. Only gateway failures
    /// carry one; everything else stays in the logs.
    pub fn upstream_detail(&self) -> Option<String> {
        match self {
            Self::OrderCreationFailed(detail) | Self::PaymentLookupFailed(detail) => {
                Some(detail.clone())
            }
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = ErrorResponse {
            success: false,
            message: self.response_message(),
            error: self.upstream_detail(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
