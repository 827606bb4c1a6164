use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::errors::ServiceError;
use crate::models::booking::Confirmation;
use crate::models::payment::PaymentVerificationResult;
use crate::services::signature::{SignatureVerifier, WebhookVerification};
use crate::store::{BookingRecordStore, StoreError};

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";
pub const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Payload {
    payment: Option<Wrapped<PaymentEntity>>,
    order: Option<Wrapped<OrderEntity>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Wrapped<T> {
    entity: T,
}

/// Payment fields a webhook may carry. Only `id` is guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderEntity {
    pub id: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub amount_paid: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Gateway events this service reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentCaptured(PaymentEntity),
    PaymentFailed(PaymentEntity),
    OrderPaid {
        order: OrderEntity,
        payment: Option<PaymentEntity>,
    },
    Unhandled(String),
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self, ServiceError> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| ServiceError::WebhookProcessing(format!("invalid payload: {e}")))?;

        let payment = envelope.payload.payment.map(|w| w.entity);
        let missing = |what: &str| {
            ServiceError::WebhookProcessing(format!("{} event without {what} entity", envelope.event))
        };

        Ok(match envelope.event.as_str() {
            "payment.captured" => Self::PaymentCaptured(payment.ok_or_else(|| missing("payment"))?),
            "payment.failed" => Self::PaymentFailed(payment.ok_or_else(|| missing("payment"))?),
            "order.paid" => Self::OrderPaid {
                order: envelope
                    .payload
                    .order
                    .map(|w| w.entity)
                    .ok_or_else(|| missing("order"))?,
                payment,
            },
            _ => Self::Unhandled(envelope.event.clone()),
        })
    }
}

/// What dispatching a verified event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    BookingConfirmed { booking_id: String },
    AlreadyConfirmed { booking_id: String },
    /// Event was valid but could not be applied to a booking.
    Skipped { reason: String },
    PaymentFailed { payment_id: String },
    Unhandled { event: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed(Dispatch),
    /// No webhook secret configured; acknowledged without dispatch.
    Unverified,
    /// Event id already handled within the de-duplication window.
    Duplicate,
}

/// Verifies, de-duplicates and dispatches gateway webhooks.
///
/// Captured and paid events confirm the pending booking whose order they
/// reference, provided the captured amount equals the order amount. Failed
/// payments leave the booking pending so the guest can retry.
#[derive(Clone)]
pub struct WebhookProcessor {
    verifier: SignatureVerifier,
    store: Arc<dyn BookingRecordStore>,
    seen: Arc<DashMap<String, Instant>>,
    dedupe_ttl: Duration,
}

impl WebhookProcessor {
    pub fn new(
        verifier: SignatureVerifier,
        store: Arc<dyn BookingRecordStore>,
        dedupe_ttl: Duration,
    ) -> Self {
        Self {
            verifier,
            store,
            seen: Arc::new(DashMap::new()),
            dedupe_ttl,
        }
    }

    #[instrument(skip(self, body, signature, event_id), fields(event_id = event_id.unwrap_or("-")))]
    pub async fn process(
        &self,
        body: &[u8],
        signature: Option<&str>,
        event_id: Option<&str>,
    ) -> Result<WebhookOutcome, ServiceError> {
        match self.verifier.verify_webhook(body, signature)? {
            WebhookVerification::Rejected => return Err(ServiceError::WebhookSignatureInvalid),
            WebhookVerification::Unverified => return Ok(WebhookOutcome::Unverified),
            WebhookVerification::Verified => {}
        }

        if let Some(id) = event_id {
            if self.already_seen(id) {
                info!("duplicate webhook delivery ignored");
                return Ok(WebhookOutcome::Duplicate);
            }
        }

        let event = WebhookEvent::parse(body)?;
        let dispatch = self.dispatch(event).await?;

        if let Some(id) = event_id {
            self.seen.insert(id.to_string(), Instant::now());
        }
        Ok(WebhookOutcome::Processed(dispatch))
    }

    fn already_seen(&self, event_id: &str) -> bool {
        let ttl = self.dedupe_ttl;
        self.seen.retain(|_, seen_at| seen_at.elapsed() < ttl);
        self.seen.contains_key(event_id)
    }

    async fn dispatch(&self, event: WebhookEvent) -> Result<Dispatch, ServiceError> {
        match event {
            WebhookEvent::PaymentCaptured(payment) => {
                info!(payment_id = %payment.id, "payment captured");
                let Some(order_id) = payment.order_id.clone() else {
                    return Ok(skipped("captured payment carries no order id"));
                };
                self.confirm_order(&order_id, &payment.id, payment.amount)
                    .await
            }
            WebhookEvent::PaymentFailed(payment) => {
                warn!(
                    payment_id = %payment.id,
                    order_id = payment.order_id.as_deref().unwrap_or("-"),
                    reason = payment.error_description.as_deref().unwrap_or("-"),
                    "payment failed; booking stays pending"
                );
                Ok(Dispatch::PaymentFailed {
                    payment_id: payment.id,
                })
            }
            WebhookEvent::OrderPaid { order, payment } => {
                info!(order_id = %order.id, "order paid");
                let Some(payment) = payment else {
                    return Ok(skipped("order.paid event carries no payment"));
                };
                let amount = payment.amount.or(order.amount_paid);
                self.confirm_order(&order.id, &payment.id, amount).await
            }
            WebhookEvent::Unhandled(event) => {
                info!(event = %event, "unhandled webhook event");
                Ok(Dispatch::Unhandled { event })
            }
        }
    }

    async fn confirm_order(
        &self,
        order_id: &str,
        payment_id: &str,
        amount: Option<i64>,
    ) -> Result<Dispatch, ServiceError> {
        let Some(amount) = amount else {
            warn!(order_id, payment_id, "webhook payment has no amount; not confirming");
            return Ok(skipped("payment amount missing"));
        };

        let booking = self
            .store
            .find_by_order(order_id)
            .await
            .map_err(|e| ServiceError::WebhookProcessing(e.to_string()))?;
        let Some(booking) = booking else {
            info!(order_id, "no booking tracked for order");
            return Ok(skipped("no booking for order"));
        };
        let booking_id = booking.reference.as_str().to_string();

        // The signed webhook stands in for the checkout signature here.
        let verification = PaymentVerificationResult {
            order_id: order_id.to_string(),
            payment_id: payment_id.to_string(),
            verified: true,
        };

        match self.store.confirm(&booking_id, &verification, Some(amount)).await {
            Ok((_, Confirmation::Confirmed)) => Ok(Dispatch::BookingConfirmed { booking_id }),
            Ok((_, Confirmation::AlreadyConfirmed)) => {
                Ok(Dispatch::AlreadyConfirmed { booking_id })
            }
            Err(StoreError::Transition(e)) => {
                warn!(booking_id = %booking_id, error = %e, "webhook could not confirm booking");
                Ok(skipped(&e.to_string()))
            }
            Err(e) => {
                error!(booking_id = %booking_id, error = %e, "booking store failed during webhook");
                Err(ServiceError::WebhookProcessing(e.to_string()))
            }
        }
    }
}

fn skipped(reason: &str) -> Dispatch {
    Dispatch::Skipped {
        reason: reason.to_string(),
    }
}
