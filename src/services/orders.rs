use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::models::booking::{Booking, BookingData};
use crate::models::payment::{PaymentSummary, PaymentVerificationResult};
use crate::services::gateway::{CreateOrderParams, PaymentGateway};
use crate::services::pricing::{to_minor_units, PriceBreakdown, PricingCalculator};
use crate::services::signature::SignatureVerifier;
use crate::store::BookingRecordStore;

/// Where the charged total came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingSource {
    /// Recomputed from the room rate and menu catalog.
    Server,
    /// Taken from the request; the booking carried no stay window.
    Client,
}

impl PricingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

/// Everything the checkout modal needs to open.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderHandle {
    pub order_id: String,
    /// Paisa
    pub amount: i64,
    pub currency: String,
    pub key: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
    pub booking_id: Option<String>,
    pub pricing: Option<PriceBreakdown>,
    pub pricing_source: PricingSource,
}

/// Result of a successful checkout verification.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub verification: PaymentVerificationResult,
    /// The stored booking after confirmation, if the store knew it.
    pub booking: Option<Booking>,
}

#[derive(Debug, Clone, Copy)]
pub struct OrderPolicy {
    /// Reject orders whose booking carries no stay window.
    pub require_priced_booking: bool,
}

/// Creates gateway orders and applies the verification gate to bookings.
#[derive(Clone)]
pub struct OrderService {
    gateway: Arc<dyn PaymentGateway>,
    key_id: String,
    pricing: PricingCalculator,
    verifier: SignatureVerifier,
    store: Arc<dyn BookingRecordStore>,
    policy: OrderPolicy,
}

impl OrderService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        key_id: impl Into<String>,
        pricing: PricingCalculator,
        verifier: SignatureVerifier,
        store: Arc<dyn BookingRecordStore>,
        policy: OrderPolicy,
    ) -> Self {
        Self {
            gateway,
            key_id: key_id.into(),
            pricing,
            verifier,
            store,
            policy,
        }
    }

    pub fn pricing(&self) -> &PricingCalculator {
        &self.pricing
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// Creates a gateway order for a booking.
    ///
    /// The client amount must be positive. When the booking carries a stay
    /// window the total is recomputed here and the client figure is only
    /// compared against it.
    #[instrument(skip(self, amount, booking), fields(booking_id))]
    pub async fn create_order(
        &self,
        amount: Option<Decimal>,
        currency: &str,
        booking: Option<&BookingData>,
    ) -> Result<OrderHandle, ServiceError> {
        let client_amount = amount
            .filter(|a| a.is_sign_positive() && !a.is_zero())
            .ok_or_else(|| ServiceError::InvalidAmount(format!("{amount:?}")))?;

        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ServiceError::BadRequest(format!("Invalid currency '{currency}'")));
        }

        if let Some(data) = booking {
            data.validate_payload()?;
            if let Some(id) = &data.booking_id {
                tracing::Span::current().record("booking_id", id.as_str());
            }
        }

        let (total, quote, source) = self.resolve_total(client_amount, booking)?;

        let amount_minor = to_minor_units(total)
            .filter(|minor| *minor > 0)
            .ok_or_else(|| ServiceError::InvalidAmount(total.to_string()))?;

        let booking_id = booking.and_then(|b| b.booking_id.clone());
        if let Some(data) = booking.filter(|b| b.booking_id.is_some()) {
            self.store
                .save_draft(Booking::draft_from(data, quote.clone(), total))
                .await?;
        }

        let receipt = match &booking_id {
            Some(id) => format!("receipt_{id}"),
            None => format!("receipt_{}", Utc::now().timestamp_millis()),
        };

        let params = CreateOrderParams {
            amount: amount_minor,
            currency: currency.to_ascii_uppercase(),
            receipt,
            notes: order_notes(booking, source),
        };

        let order = self.gateway.create_order(params.clone()).await.map_err(|e| {
            warn!(error = %e, "gateway order creation failed");
            ServiceError::OrderCreationFailed(e.to_string())
        })?;

        if let Some(id) = &booking_id {
            self.store.attach_order(id, &order.id, order.amount).await?;
        }

        info!(
            order_id = %order.id,
            amount = order.amount,
            pricing_source = source.as_str(),
            "payment order created"
        );

        Ok(OrderHandle {
            amount: order.amount,
            currency: order.currency,
            key: self.key_id.clone(),
            receipt: order.receipt.unwrap_or(params.receipt),
            notes: if order.notes.is_empty() {
                params.notes
            } else {
                order.notes
            },
            order_id: order.id,
            booking_id,
            pricing: quote,
            pricing_source: source,
        })
    }

    fn resolve_total(
        &self,
        client_amount: Decimal,
        booking: Option<&BookingData>,
    ) -> Result<(Decimal, Option<PriceBreakdown>, PricingSource), ServiceError> {
        let stay = booking.and_then(|b| b.stay_window()).transpose()?;

        match (booking, stay) {
            (Some(data), Some(stay)) => {
                let quote = self
                    .pricing
                    .quote(&stay, &data.selected_items.to_selections())?;
                if quote.total != client_amount {
                    warn!(
                        client_amount = %client_amount,
                        server_total = %quote.total,
                        "client total disagrees with server pricing; charging server total"
                    );
                }
                Ok((quote.total, Some(quote), PricingSource::Server))
            }
            _ if self.policy.require_priced_booking => Err(ServiceError::InvalidBooking(
                "checkIn and checkOut are required to price the booking".to_string(),
            )),
            _ => Ok((client_amount, None, PricingSource::Client)),
        }
    }

    /// Looks a payment up at the gateway.
    #[instrument(skip(self))]
    pub async fn payment_details(&self, payment_id: &str) -> Result<PaymentSummary, ServiceError> {
        if !is_gateway_id(payment_id) {
            return Err(ServiceError::BadRequest(format!(
                "Invalid payment id '{payment_id}'"
            )));
        }

        let payment = self.gateway.fetch_payment(payment_id).await.map_err(|e| {
            warn!(error = %e, "gateway payment lookup failed");
            ServiceError::PaymentLookupFailed(e.to_string())
        })?;

        Ok(PaymentSummary {
            id: payment.id,
            amount: payment.amount,
            currency: payment.currency,
            status: payment.status,
            method: payment.method,
            order_id: payment.order_id,
            created_at: payment.created_at,
        })
    }

    /// Checks a checkout callback and, when it carries a booking reference,
    /// confirms that booking.
    #[instrument(skip(self, signature, booking))]
    pub async fn verify_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
        booking: Option<&BookingData>,
    ) -> Result<VerifiedPayment, ServiceError> {
        let verification = self.verifier.verify(order_id, payment_id, signature)?;
        if !verification.verified {
            warn!("payment verification failed: signature mismatch");
            return Err(ServiceError::SignatureMismatch);
        }

        let booking_id = booking.and_then(|b| b.booking_id.as_deref());
        let booking = match booking_id {
            Some(id) => self.confirm_payment(&verification, id).await?,
            None => None,
        };

        info!(
            booking_id = booking_id.unwrap_or("-"),
            "payment verified"
        );
        Ok(VerifiedPayment {
            verification,
            booking,
        })
    }

    /// Applies a verification to the stored booking. Unknown bookings are
    /// left alone.
    pub async fn confirm_payment(
        &self,
        verification: &PaymentVerificationResult,
        booking_id: &str,
    ) -> Result<Option<Booking>, ServiceError> {
        if self.store.get(booking_id).await?.is_none() {
            info!(booking_id = %booking_id, "booking not tracked by store; nothing to confirm");
            return Ok(None);
        }

        let (booking, _) = self.store.confirm(booking_id, verification, None).await?;
        Ok(Some(booking))
    }
}

/// Gateway ids are ASCII alphanumerics and underscores (`pay_29QQoUBi66xm2f`).
/// They are interpolated into gateway URLs, so nothing else gets through.
fn is_gateway_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn order_notes(booking: Option<&BookingData>, source: PricingSource) -> BTreeMap<String, String> {
    let mut notes = BTreeMap::new();
    if let Some(data) = booking {
        if let Some(id) = &data.booking_id {
            notes.insert("booking_id".to_string(), id.clone());
        }
        if let Some(check_in) = &data.check_in {
            notes.insert("check_in".to_string(), check_in.clone());
        }
        if let Some(check_out) = &data.check_out {
            notes.insert("check_out".to_string(), check_out.clone());
        }
    }
    notes.insert(
        "guest_name".to_string(),
        booking.and_then(BookingData::guest_name).unwrap_or_default(),
    );
    notes.insert(
        "guests".to_string(),
        booking
            .and_then(|b| b.adults)
            .map(|adults| format!("{adults} adults"))
            .unwrap_or_default(),
    );
    notes.insert("pricing_source".to_string(), source.as_str().to_string());
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::BookingStatus;
    use crate::services::gateway::{GatewayError, GatewayOrder, GatewayPayment};
    use crate::services::signature::checkout_signature;
    use crate::store::InMemoryBookingStore;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use mockall::mock;
    use rust_decimal_macros::dec;

    mock! {
        pub PaymentGateway {}
        #[async_trait]
        impl PaymentGateway for PaymentGateway {
            async fn create_order(&self, params: CreateOrderParams) -> Result<GatewayOrder, GatewayError>;
            async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
        }
    }

    const SECRET: &str = "test_key_secret";

    fn echo_gateway() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_order().returning(|params| {
            Ok(GatewayOrder {
                id: "order_test".into(),
                amount: params.amount,
                currency: params.currency,
                receipt: Some(params.receipt),
                status: Some("created".into()),
                notes: params.notes,
                created_at: Some(1_700_000_000),
            })
        });
        gateway
    }

    fn service(gateway: MockPaymentGateway, store: Arc<InMemoryBookingStore>) -> OrderService {
        OrderService::new(
            Arc::new(gateway),
            "rzp_test_key",
            PricingCalculator::default(),
            SignatureVerifier::new(SECRET.to_string(), None),
            store,
            OrderPolicy {
                require_priced_booking: false,
            },
        )
    }

    fn priced_booking() -> BookingData {
        BookingData {
            booking_id: Some("BK100".into()),
            first_name: Some("Asha".into()),
            last_name: Some("Rao".into()),
            check_in: Some("2025-02-01".into()),
            check_out: Some("2025-02-02".into()),
            adults: Some(2),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn converts_rupees_to_paisa() {
        let svc = service(echo_gateway(), Arc::new(InMemoryBookingStore::new()));
        let handle = svc.create_order(Some(dec!(2832)), "INR", None).await.unwrap();
        assert_eq!(handle.amount, 283_200);
        assert_eq!(handle.key, "rzp_test_key");
        assert!(handle.receipt.starts_with("receipt_"));
        assert_eq!(handle.pricing_source, PricingSource::Client);
        assert_eq!(handle.notes.get("guest_name").map(String::as_str), Some(""));
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts_without_gateway_call() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_order().never();
        let svc = service(gateway, Arc::new(InMemoryBookingStore::new()));

        for amount in [None, Some(Decimal::ZERO), Some(dec!(-5))] {
            assert_matches!(
                svc.create_order(amount, "INR", None).await,
                Err(ServiceError::InvalidAmount(_))
            );
        }
    }

    #[tokio::test]
    async fn server_total_overrides_client_amount() {
        let store = Arc::new(InMemoryBookingStore::new());
        let svc = service(echo_gateway(), store.clone());

        let handle = svc
            .create_order(Some(dec!(1)), "INR", Some(&priced_booking()))
            .await
            .unwrap();

        assert_eq!(handle.amount, 283_200);
        assert_eq!(handle.receipt, "receipt_BK100");
        assert_eq!(handle.notes["guests"], "2 adults");
        assert_eq!(handle.notes["guest_name"], "Asha Rao");
        assert_eq!(handle.notes["pricing_source"], "server");

        let stored = store.get("BK100").await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::PendingPayment);
        assert_eq!(stored.order_amount, Some(283_200));
    }

    #[tokio::test]
    async fn unknown_menu_item_rejected() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_order().never();
        let svc = service(gateway, Arc::new(InMemoryBookingStore::new()));

        let mut booking = priced_booking();
        booking.selected_items = crate::models::booking::SelectedItems::Map(
            [("lobster".to_string(), 1)].into_iter().collect(),
        );
        assert_matches!(
            svc.create_order(Some(dec!(2832)), "INR", Some(&booking)).await,
            Err(ServiceError::UnknownMenuItem(id)) if id == "lobster"
        );
    }

    #[tokio::test]
    async fn unpriced_booking_rejected_when_policy_requires_it() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_order().never();
        let svc = OrderService::new(
            Arc::new(gateway),
            "rzp_test_key",
            PricingCalculator::default(),
            SignatureVerifier::new(SECRET.to_string(), None),
            Arc::new(InMemoryBookingStore::new()),
            OrderPolicy {
                require_priced_booking: true,
            },
        );
        assert_matches!(
            svc.create_order(Some(dec!(2832)), "INR", None).await,
            Err(ServiceError::InvalidBooking(_))
        );
    }

    #[tokio::test]
    async fn gateway_failure_maps_to_order_creation_failed() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_order()
            .returning(|_| Err(GatewayError::Rejected("Authentication failed".into())));
        let svc = service(gateway, Arc::new(InMemoryBookingStore::new()));

        assert_matches!(
            svc.create_order(Some(dec!(2832)), "INR", None).await,
            Err(ServiceError::OrderCreationFailed(msg)) if msg == "Authentication failed"
        );
    }

    #[tokio::test]
    async fn verify_confirms_stored_booking() {
        let store = Arc::new(InMemoryBookingStore::new());
        let svc = service(echo_gateway(), store.clone());
        let booking = priced_booking();
        let handle = svc
            .create_order(Some(dec!(2832)), "INR", Some(&booking))
            .await
            .unwrap();

        let signature = checkout_signature(SECRET, &handle.order_id, "pay_1").unwrap();
        let verified = svc
            .verify_payment(&handle.order_id, "pay_1", &signature, Some(&booking))
            .await
            .unwrap();

        assert!(verified.verification.verified);
        assert_eq!(
            verified.booking.map(|b| b.status),
            Some(BookingStatus::Confirmed)
        );
    }

    #[tokio::test]
    async fn verify_rejects_mismatch_and_order_swap() {
        let store = Arc::new(InMemoryBookingStore::new());
        let svc = service(echo_gateway(), store.clone());
        let booking = priced_booking();
        svc.create_order(Some(dec!(2832)), "INR", Some(&booking))
            .await
            .unwrap();

        assert_matches!(
            svc.verify_payment("order_test", "pay_1", "00ff", Some(&booking))
                .await,
            Err(ServiceError::SignatureMismatch)
        );

        // Valid signature, but for an order that is not this booking's
        let signature = checkout_signature(SECRET, "order_other", "pay_1").unwrap();
        assert_matches!(
            svc.verify_payment("order_other", "pay_1", &signature, Some(&booking))
                .await,
            Err(ServiceError::BookingStateConflict(_))
        );
        assert_eq!(
            store.get("BK100").await.unwrap().unwrap().status,
            BookingStatus::PendingPayment
        );
    }

    #[tokio::test]
    async fn malformed_payment_ids_never_reach_the_gateway() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_fetch_payment().never();
        let svc = service(gateway, Arc::new(InMemoryBookingStore::new()));

        for payment_id in ["", "../orders", "pay_1/refunds", "pay 1", "pay_%2F..", "pay_1?expand=card"] {
            assert_matches!(
                svc.payment_details(payment_id).await,
                Err(ServiceError::BadRequest(_)),
                "{:?} should be rejected",
                payment_id
            );
        }
    }

    #[tokio::test]
    async fn payment_details_normalized() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_fetch_payment()
            .times(1)
            .returning(|payment_id| {
                assert_eq!(payment_id, "pay_xyz");
                Ok(GatewayPayment {
                    id: "pay_xyz".into(),
                    amount: 283_200,
                    currency: "INR".into(),
                    status: "captured".into(),
                    order_id: Some("order_abc".into()),
                    method: Some("card".into()),
                    email: None,
                    contact: None,
                    error_description: None,
                    notes: BTreeMap::new(),
                    created_at: 1_700_000_001,
                })
            });
        let svc = service(gateway, Arc::new(InMemoryBookingStore::new()));

        let summary = svc.payment_details("pay_xyz").await.unwrap();
        assert_eq!(summary.status, "captured");
        assert_eq!(summary.method.as_deref(), Some("card"));
        assert_eq!(summary.created_at, 1_700_000_001);
    }
}
