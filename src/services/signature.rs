use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::models::payment::PaymentVerificationResult;

type HmacSha256 = Hmac<Sha256>;

/// Source of a shared HMAC key. Kept behind a trait so the key material is
/// only touched once every input has been checked.
pub trait SigningSecret: Send + Sync {
    fn secret(&self) -> &str;
}

impl SigningSecret for String {
    fn secret(&self) -> &str {
        self.as_str()
    }
}

impl SigningSecret for &'static str {
    fn secret(&self) -> &str {
        self
    }
}

/// How a webhook delivery fared against the configured secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookVerification {
    Verified,
    /// No webhook secret configured; the delivery cannot be authenticated.
    Unverified,
    Rejected,
}

impl WebhookVerification {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

fn hmac_hex(secret: &str, message: &[u8]) -> Result<String, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("invalid HMAC key: {e}")))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of a hex signature against the HMAC of `message`.
/// Malformed hex never matches.
fn hmac_matches(secret: &str, message: &[u8], signature_hex: &str) -> Result<bool, ServiceError> {
    let Ok(provided) = hex::decode(signature_hex.trim()) else {
        return Ok(false);
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("invalid HMAC key: {e}")))?;
    mac.update(message);
    Ok(mac.verify_slice(&provided).is_ok())
}

/// Signature the gateway attaches to a checkout callback:
/// `hex(HMAC_SHA256(key_secret, order_id + "|" + payment_id))`.
pub fn checkout_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
) -> Result<String, ServiceError> {
    hmac_hex(key_secret, format!("{order_id}|{payment_id}").as_bytes())
}

/// Signature the gateway sends in `x-razorpay-signature`.
pub fn webhook_signature(webhook_secret: &str, body: &[u8]) -> Result<String, ServiceError> {
    hmac_hex(webhook_secret, body)
}

/// Checks a webhook body. An absent or blank secret yields `Unverified`
/// rather than an error.
pub fn verify_webhook_signature(
    body: &[u8],
    header_signature: Option<&str>,
    webhook_secret: Option<&str>,
) -> Result<WebhookVerification, ServiceError> {
    let Some(secret) = webhook_secret.filter(|s| !s.trim().is_empty()) else {
        warn!("webhook secret not configured; accepting delivery unverified");
        return Ok(WebhookVerification::Unverified);
    };

    let Some(signature) = header_signature.filter(|s| !s.trim().is_empty()) else {
        warn!("webhook delivery missing signature header");
        return Ok(WebhookVerification::Rejected);
    };

    if hmac_matches(secret, body, signature)? {
        debug!("webhook signature verified");
        Ok(WebhookVerification::Verified)
    } else {
        warn!("webhook signature mismatch");
        Ok(WebhookVerification::Rejected)
    }
}

/// Verifies checkout callbacks and webhook deliveries against the gateway's
/// shared secrets.
#[derive(Clone)]
pub struct SignatureVerifier {
    key_secret: Arc<dyn SigningSecret>,
    webhook_secret: Option<Arc<String>>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("key_secret", &"[redacted]")
            .field("webhook_secret_configured", &self.webhook_secret.is_some())
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(key_secret: impl SigningSecret + 'static, webhook_secret: Option<String>) -> Self {
        Self {
            key_secret: Arc::new(key_secret),
            webhook_secret: webhook_secret
                .filter(|s| !s.trim().is_empty())
                .map(Arc::new),
        }
    }

    pub fn has_webhook_secret(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// Recomputes the checkout signature and compares it in constant time.
    /// Empty inputs fail with `MissingVerificationParameters` before the
    /// secret is read.
    pub fn verify(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<PaymentVerificationResult, ServiceError> {
        if order_id.is_empty() || payment_id.is_empty() || signature.is_empty() {
            return Err(ServiceError::MissingVerificationParameters);
        }

        let message = format!("{order_id}|{payment_id}");
        let verified = hmac_matches(self.key_secret.secret(), message.as_bytes(), signature)?;

        Ok(PaymentVerificationResult {
            order_id: order_id.to_string(),
            payment_id: payment_id.to_string(),
            verified,
        })
    }

    pub fn verify_webhook(
        &self,
        body: &[u8],
        header_signature: Option<&str>,
    ) -> Result<WebhookVerification, ServiceError> {
        verify_webhook_signature(
            body,
            header_signature,
            self.webhook_secret.as_deref().map(String::as_str),
        )
    }
}
