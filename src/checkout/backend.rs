use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::dto::{CreateOrderRequest, CreateOrderResponse, VerifyPaymentRequest, VerifyPaymentResponse};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The server answered with a failure body.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("payment server unreachable: {0}")]
    Transport(String),
    #[error("unexpected payment server response: {0}")]
    Decode(String),
}

/// The payment server endpoints the checkout page calls.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, BackendError>;

    async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, BackendError>;
}

#[derive(Deserialize)]
struct FailureBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`PaymentBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPaymentBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPaymentBackend {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<Req, Resp>(&self, route: &str, body: &Req) -> Result<Resp, BackendError>
    where
        Req: serde::Serialize + ?Sized,
        Resp: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, route))
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<FailureBody>(&text)
                .ok()
                .and_then(|body| body.message.or(body.error))
                .unwrap_or_else(|| format!("payment server returned {status}"));
            warn!(route, status = status.as_u16(), message = %message, "payment server rejected request");
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentBackend for HttpPaymentBackend {
    #[instrument(skip(self, request))]
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, BackendError> {
        let response: CreateOrderResponse = self.post("/create-order", request).await?;
        debug!(order_id = %response.order_id, "order created");
        Ok(response)
    }

    #[instrument(skip(self, request))]
    async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, BackendError> {
        self.post("/verify-payment", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal::Decimal;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_order_round_trips_the_server_contract() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/create-order"))
            .and(body_partial_json(json!({"currency": "INR"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "key": "rzp_test_abc",
                "orderId": "order_abc",
                "order_id": "order_abc",
                "amount": 283200,
                "currency": "INR",
                "receipt": "receipt_BK1",
                "notes": {"booking_id": "BK1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpPaymentBackend::new(server.uri(), None).unwrap();
        let response = backend
            .create_order(&CreateOrderRequest {
                amount: Some(Decimal::from(2832)),
                currency: Some("INR".into()),
                booking_data: None,
            })
            .await
            .unwrap();

        assert_eq!(response.order_id, "order_abc");
        assert_eq!(response.amount, 283_200);
    }

    #[tokio::test]
    async fn failure_body_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify-payment"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "message": "Payment verification failed - invalid signature"
            })))
            .mount(&server)
            .await;

        let backend = HttpPaymentBackend::new(server.uri(), None).unwrap();
        let result = backend
            .verify_payment(&VerifyPaymentRequest::default())
            .await;

        assert_matches!(result, Err(BackendError::Rejected { status: 400, message })
            if message == "Payment verification failed - invalid signature");
    }
}
