use std::fmt;

/// Where a checkout attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    /// Gateway script not yet loaded, or loading failed.
    ScriptLoading,
    Ready,
    /// Modal open; waiting for the guest.
    AwaitingGatewayResult,
    Verifying,
    Confirmed,
    VerificationFailed,
    /// Guest closed the modal.
    Cancelled,
    /// Gateway reported the payment as failed.
    GatewayError,
}

impl CheckoutState {
    /// States from which the guest may start a (new) payment attempt.
    pub fn accepts_payment(&self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Cancelled | Self::GatewayError | Self::VerificationFailed
        )
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ScriptLoading => "script_loading",
            Self::Ready => "ready",
            Self::AwaitingGatewayResult => "awaiting_gateway_result",
            Self::Verifying => "verifying",
            Self::Confirmed => "confirmed",
            Self::VerificationFailed => "verification_failed",
            Self::Cancelled => "cancelled",
            Self::GatewayError => "gateway_error",
        };
        f.write_str(name)
    }
}
