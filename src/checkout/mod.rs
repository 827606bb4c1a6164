//! Browser-side checkout flow, as a typed library.
//!
//! The gateway's script and modal sit behind [`CheckoutGateway`]; the payment
//! server sits behind [`PaymentBackend`]. [`CheckoutOrchestrator`] sequences
//! them and tracks [`CheckoutState`].

pub mod backend;
pub mod gateway;
pub mod orchestrator;
pub mod state;

pub use backend::{BackendError, HttpPaymentBackend, PaymentBackend};
pub use gateway::{
    Branding, CheckoutGateway, CheckoutOptions, GatewayResult, GatewaySuccess, Prefill,
    ScriptLoadError, CHECKOUT_SCRIPT_URL,
};
pub use orchestrator::{
    CheckoutError, CheckoutOrchestrator, CheckoutOutcome, CheckoutRequest, ConfirmationView,
    Consent,
};
pub use state::CheckoutState;
