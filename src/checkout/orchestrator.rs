use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use super::backend::{BackendError, PaymentBackend};
use super::gateway::{
    Branding, CheckoutGateway, CheckoutOptions, GatewayResult, GatewaySuccess, Prefill, Theme,
};
use super::state::CheckoutState;
use crate::dto::{CreateOrderRequest, CreateOrderResponse, VerifyPaymentRequest, DEFAULT_CURRENCY};
use crate::models::booking::BookingData;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("payment gateway is not available; reload and try again")]
    GatewayUnavailable,
    #[error("terms and cancellation policy must be accepted")]
    TermsNotAccepted,
    #[error("failed to create payment order: {0}")]
    OrderCreationFailed(String),
    #[error("cannot start a payment while {0}")]
    InvalidState(CheckoutState),
    #[error(transparent)]
    Backend(BackendError),
}

/// The two checkboxes on the payment page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Consent {
    pub terms_accepted: bool,
    pub cancellation_policy_accepted: bool,
}

impl Consent {
    pub fn accepted() -> Self {
        Self {
            terms_accepted: true,
            cancellation_policy_accepted: true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.terms_accepted && self.cancellation_policy_accepted
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub booking: BookingData,
    /// Total shown to the guest, in rupees.
    pub total: Decimal,
    pub currency: String,
}

impl CheckoutRequest {
    pub fn new(booking: BookingData, total: Decimal) -> Self {
        Self {
            booking,
            total,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// What the confirmation page renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationView {
    pub booking_id: Option<String>,
    pub payment_id: String,
    pub order_id: String,
    pub guest_name: Option<String>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    /// Rupees shown on the payment page
    pub total_amount: Decimal,
    /// Paisa actually charged
    pub charged_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Confirmed(ConfirmationView),
    /// Payment went through at the gateway but the server did not accept the
    /// callback. The guest should contact support with the payment id.
    VerificationFailed { payment_id: String, message: String },
    GatewayFailed { description: String },
    Cancelled,
}

/// Drives one booking's checkout: script, order, modal, verification.
pub struct CheckoutOrchestrator {
    gateway: Arc<dyn CheckoutGateway>,
    backend: Arc<dyn PaymentBackend>,
    branding: Branding,
    state: CheckoutState,
    script_loaded: bool,
}

impl CheckoutOrchestrator {
    pub fn new(gateway: Arc<dyn CheckoutGateway>, backend: Arc<dyn PaymentBackend>) -> Self {
        Self {
            gateway,
            backend,
            branding: Branding::default(),
            state: CheckoutState::ScriptLoading,
            script_loaded: false,
        }
    }

    pub fn with_branding(mut self, branding: Branding) -> Self {
        self.branding = branding;
        self
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    /// Loads the gateway script. On failure the orchestrator stays unusable
    /// until a later call succeeds.
    pub async fn initialize(&mut self) -> Result<(), CheckoutError> {
        if self.script_loaded {
            return Ok(());
        }
        match self.gateway.load_script().await {
            Ok(()) => {
                self.script_loaded = true;
                self.state = CheckoutState::Ready;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "checkout script failed to load");
                Err(CheckoutError::GatewayUnavailable)
            }
        }
    }

    /// Runs one payment attempt. Every attempt creates a fresh order.
    #[instrument(skip_all, fields(booking_id = request.booking.booking_id.as_deref().unwrap_or("-")))]
    pub async fn pay(
        &mut self,
        consent: Consent,
        request: &CheckoutRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        if !self.state.accepts_payment() {
            return Err(if self.script_loaded {
                CheckoutError::InvalidState(self.state)
            } else {
                CheckoutError::GatewayUnavailable
            });
        }
        if !consent.is_complete() {
            return Err(CheckoutError::TermsNotAccepted);
        }

        let order = self
            .backend
            .create_order(&CreateOrderRequest {
                amount: Some(request.total),
                currency: Some(request.currency.clone()),
                booking_data: Some(request.booking.clone()),
            })
            .await
            .map_err(|e| match e {
                BackendError::Rejected { message, .. } => CheckoutError::OrderCreationFailed(message),
                other => CheckoutError::Backend(other),
            })?;

        let options = self.checkout_options(&order, &request.booking);
        self.state = CheckoutState::AwaitingGatewayResult;

        match self.gateway.open(&options).await {
            GatewayResult::Success(success) => Ok(self.verify(success, &order, request).await),
            GatewayResult::Failed { code, description } => {
                warn!(
                    order_id = %order.order_id,
                    code = code.as_deref().unwrap_or("-"),
                    description = %description,
                    "gateway reported payment failure"
                );
                self.state = CheckoutState::GatewayError;
                Ok(CheckoutOutcome::GatewayFailed { description })
            }
            GatewayResult::Dismissed => {
                info!(order_id = %order.order_id, "checkout dismissed");
                self.state = CheckoutState::Cancelled;
                Ok(CheckoutOutcome::Cancelled)
            }
        }
    }

    async fn verify(
        &mut self,
        success: GatewaySuccess,
        order: &CreateOrderResponse,
        request: &CheckoutRequest,
    ) -> CheckoutOutcome {
        self.state = CheckoutState::Verifying;

        let verdict = self
            .backend
            .verify_payment(&VerifyPaymentRequest {
                razorpay_order_id: Some(success.razorpay_order_id.clone()),
                razorpay_payment_id: Some(success.razorpay_payment_id.clone()),
                razorpay_signature: Some(success.razorpay_signature),
                booking_data: Some(request.booking.clone()),
            })
            .await;

        match verdict {
            Ok(response) if response.success => {
                self.state = CheckoutState::Confirmed;
                info!(payment_id = %response.payment_id, "booking confirmed");
                CheckoutOutcome::Confirmed(ConfirmationView {
                    booking_id: response
                        .booking_id
                        .or_else(|| request.booking.booking_id.clone()),
                    payment_id: response.payment_id,
                    order_id: response.order_id,
                    guest_name: request.booking.guest_name(),
                    check_in: request.booking.check_in.clone(),
                    check_out: request.booking.check_out.clone(),
                    total_amount: request.total,
                    charged_amount: order.amount,
                })
            }
            Ok(response) => self.verification_failed(success.razorpay_payment_id, response.message),
            Err(e) => self.verification_failed(success.razorpay_payment_id, e.to_string()),
        }
    }

    fn verification_failed(&mut self, payment_id: String, message: String) -> CheckoutOutcome {
        warn!(payment_id = %payment_id, message = %message, "payment verification failed");
        self.state = CheckoutState::VerificationFailed;
        CheckoutOutcome::VerificationFailed {
            payment_id,
            message,
        }
    }

    fn checkout_options(&self, order: &CreateOrderResponse, booking: &BookingData) -> CheckoutOptions {
        let booking_id = booking.booking_id.as_deref().unwrap_or_default();
        let description = match booking.stay_window().and_then(Result::ok) {
            Some(stay) => format!("Booking for {} night(s) - {}", stay.nights(), booking_id),
            None => format!("Booking - {booking_id}"),
        };
        let guest = booking.guest_details();
        let counts = booking.guest_counts();

        let mut notes = BTreeMap::new();
        if let Some(id) = &booking.booking_id {
            notes.insert("booking_id".to_string(), id.clone());
        }
        if let Some(check_in) = &booking.check_in {
            notes.insert("check_in".to_string(), check_in.clone());
        }
        if let Some(check_out) = &booking.check_out {
            notes.insert("check_out".to_string(), check_out.clone());
        }
        notes.insert(
            "guests".to_string(),
            format!("{} adults, {} children", counts.adults, counts.children),
        );

        CheckoutOptions {
            key: order.key.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            name: self.branding.name.clone(),
            description,
            image: self.branding.image.clone(),
            order_id: order.order_id.clone(),
            prefill: Prefill {
                name: guest.full_name(),
                email: guest.email,
                contact: guest.phone,
            },
            notes,
            theme: Theme {
                color: self.branding.theme_color.clone(),
            },
        }
    }
}
