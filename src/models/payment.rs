use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Gateway-side order created for a checkout attempt. Immutable once the
/// gateway has accepted it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentOrder {
    pub order_id: String,
    /// Amount in paisa
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of checking a checkout callback signature. `verified` is derived
/// from the signature comparison alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentVerificationResult {
    pub order_id: String,
    pub payment_id: String,
    pub verified: bool,
}

/// Payment record as reported by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentSummary {
    pub id: String,
    /// Amount in paisa
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub method: Option<String>,
    pub order_id: Option<String>,
    /// Unix seconds, as the gateway reports it
    pub created_at: i64,
}
