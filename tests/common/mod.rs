#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use homestay_payments::{
    app_router, config::AppConfig, services::signature, store::InMemoryBookingStore, AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

pub const KEY_ID: &str = "rzp_test_homestay";
pub const KEY_SECRET: &str = "test_key_secret";
pub const WEBHOOK_SECRET: &str = "test_webhook_secret";

/// Answers `POST /orders` the way Razorpay does, echoing amount, currency,
/// receipt and notes back with a fresh order id.
pub struct EchoOrder {
    counter: Arc<AtomicUsize>,
}

impl Respond for EchoOrder {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_else(|_| json!({}));
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("order_test{n:04}"),
            "entity": "order",
            "amount": body["amount"],
            "amount_paid": 0,
            "currency": body["currency"],
            "receipt": body["receipt"],
            "status": "created",
            "notes": body.get("notes").cloned().unwrap_or_else(|| json!([])),
            "created_at": 1_735_689_600
        }))
    }
}

/// Router plus a mocked gateway, wired exactly like the binary.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: MockServer,
    pub store: Arc<InMemoryBookingStore>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the test adjust the configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(EchoOrder {
                counter: Arc::new(AtomicUsize::new(0)),
            })
            .mount(&gateway)
            .await;
        Mock::given(method("GET"))
            .and(path("/payments/pay_xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pay_xyz",
                "entity": "payment",
                "amount": 283200,
                "currency": "INR",
                "status": "captured",
                "order_id": "order_abc",
                "method": "upi",
                "email": "asha@example.com",
                "contact": "+919876543210",
                "notes": [],
                "created_at": 1_735_689_700
            })))
            .mount(&gateway)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/payments/pay_missing"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": "BAD_REQUEST_ERROR",
                    "description": "The id provided does not exist"
                }
            })))
            .mount(&gateway)
            .await;

        let mut cfg = AppConfig::new(KEY_ID.into(), KEY_SECRET.into(), "test".into());
        cfg.razorpay_api_base = gateway.uri();
        cfg.razorpay_webhook_secret = Some(WEBHOOK_SECRET.into());
        cfg.cors_allow_any_origin = true;
        adjust(&mut cfg);

        let store = Arc::new(InMemoryBookingStore::new());
        let gateway_client = homestay_payments::services::RazorpayGateway::new(
            cfg.razorpay_key_id.clone(),
            cfg.razorpay_key_secret.clone(),
            cfg.razorpay_api_base.clone(),
            None,
        )
        .expect("gateway client");
        let state = AppState::new(cfg, Arc::new(gateway_client), store.clone());

        Self {
            router: app_router(state.clone()),
            state,
            gateway,
            store,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let body = match body {
            Some(json) => serde_json::to_vec(&json).expect("failed to serialize json request body"),
            None => Vec::new(),
        };
        self.request_raw(method, uri, body, headers).await
    }

    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if !body.is_empty() {
            builder = builder.header("content-type", "application/json");
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder.body(Body::from(body)).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(body), &[]).await
    }

    /// Delivers a webhook body signed with the configured secret.
    pub async fn deliver_webhook(&self, body: &Value, event_id: Option<&str>) -> Response {
        let raw = serde_json::to_vec(body).expect("webhook body");
        let signature =
            signature::webhook_signature(WEBHOOK_SECRET, &raw).expect("webhook signature");
        let mut headers = vec![("x-razorpay-signature", signature.as_str())];
        if let Some(id) = event_id {
            headers.push(("x-razorpay-event-id", id));
        }
        self.request_raw(Method::POST, "/webhook", raw, &headers).await
    }

    pub async fn gateway_order_calls(&self) -> usize {
        self.gateway
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "POST" && r.url.path() == "/orders")
            .count()
    }
}

pub fn checkout_signature(order_id: &str, payment_id: &str) -> String {
    signature::checkout_signature(KEY_SECRET, order_id, payment_id).expect("checkout signature")
}

/// One night, two adults, no add-ons: 2400 + 18% = 2832.
pub fn one_night_booking(booking_id: &str) -> Value {
    json!({
        "schemaVersion": 1,
        "bookingId": booking_id,
        "firstName": "Asha",
        "lastName": "Rao",
        "email": "asha@example.com",
        "phone": "+91 98765 43210",
        "checkIn": "2025-02-01",
        "checkOut": "2025-02-02",
        "adults": "2",
        "children": 0,
        "selectedItems": {}
    })
}

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not JSON")
}

pub async fn read_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("response body is not UTF-8")
}
