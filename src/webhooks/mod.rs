/// Inbound payment gateway webhooks
pub mod razorpay;

pub use razorpay::{
    Dispatch, WebhookEvent, WebhookOutcome, WebhookProcessor, EVENT_ID_HEADER, SIGNATURE_HEADER,
};
