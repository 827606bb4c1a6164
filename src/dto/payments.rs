use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::booking::{BookingData, BookingStatus};
use crate::models::payment::PaymentSummary;
use crate::services::pricing::PriceBreakdown;

pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "amount": 2832,
    "currency": "INR",
    "bookingData": {
        "schemaVersion": 1,
        "bookingId": "BK48291300QZ7K",
        "firstName": "Asha",
        "lastName": "Rao",
        "email": "asha@example.com",
        "checkIn": "2025-02-01",
        "checkOut": "2025-02-02",
        "adults": 2
    }
}))]
pub struct CreateOrderRequest {
    /// Amount in rupees as computed by the client
    #[schema(value_type = f64, example = 2832)]
    pub amount: Option<Decimal>,
    /// ISO currency code, defaults to the configured currency
    pub currency: Option<String>,
    #[serde(rename = "bookingData")]
    pub booking_data: Option<BookingData>,
}

impl CreateOrderRequest {
    /// The requested currency, or `fallback` when the request left it blank.
    pub fn currency_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.currency
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub success: bool,
    /// Public gateway key for the checkout modal
    pub key: String,
    #[serde(rename = "orderId")]
    pub order_id: String,
    /// Same as `orderId`; the checkout script reads this spelling
    #[serde(rename = "order_id")]
    pub order_id_alias: String,
    /// Paisa
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
    #[serde(rename = "bookingId", default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PriceBreakdown>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "razorpay_order_id": "order_abc",
    "razorpay_payment_id": "pay_xyz",
    "razorpay_signature": "5f1c...e9",
    "bookingData": {"bookingId": "BK48291300QZ7K"}
}))]
pub struct VerifyPaymentRequest {
    #[serde(default)]
    pub razorpay_order_id: Option<String>,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub razorpay_signature: Option<String>,
    #[serde(rename = "bookingData", default)]
    pub booking_data: Option<BookingData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "paymentId")]
    pub payment_id: String,
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "bookingId", default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(rename = "bookingStatus", default, skip_serializing_if = "Option::is_none")]
    pub booking_status: Option<BookingStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentDetailsResponse {
    pub success: bool,
    pub payment: PaymentSummary,
}
