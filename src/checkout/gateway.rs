use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const CHECKOUT_SCRIPT_URL: &str = "https://checkout.razorpay.com/v1/checkout.js";

/// Business name and colours shown in the checkout modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    pub name: String,
    pub image: Option<String>,
    pub theme_color: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            name: "Lal Cottage".to_string(),
            image: Some("/logo.png".to_string()),
            theme_color: "#8B4513".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub color: String,
}

/// Options handed to the checkout modal, in the gateway's field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutOptions {
    pub key: String,
    /// Paisa
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub order_id: String,
    pub prefill: Prefill,
    pub notes: BTreeMap<String, String>,
    pub theme: Theme,
}

/// Fields the gateway passes to the success handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySuccess {
    pub razorpay_payment_id: String,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResult {
    Success(GatewaySuccess),
    Failed {
        code: Option<String>,
        description: String,
    },
    /// Modal closed without paying.
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("checkout script could not be loaded: {0}")]
pub struct ScriptLoadError(pub String);

/// Adapter over the gateway's browser checkout.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn load_script(&self) -> Result<(), ScriptLoadError>;

    /// Opens the modal and resolves once the guest pays, fails or closes it.
    async fn open(&self, options: &CheckoutOptions) -> GatewayResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_serialize_in_gateway_shape() {
        let options = CheckoutOptions {
            key: "rzp_test_abc".into(),
            amount: 283_200,
            currency: "INR".into(),
            name: Branding::default().name,
            description: "Booking for 1 night(s) - BK1".into(),
            image: None,
            order_id: "order_abc".into(),
            prefill: Prefill {
                name: "Asha Rao".into(),
                email: "asha@example.com".into(),
                contact: "9876543210".into(),
            },
            notes: BTreeMap::new(),
            theme: Theme {
                color: "#8B4513".into(),
            },
        };

        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["order_id"], "order_abc");
        assert_eq!(value["theme"], json!({"color": "#8B4513"}));
        assert!(value.get("image").is_none());
    }
}
