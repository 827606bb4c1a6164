pub mod payments;

pub use payments::{
    CreateOrderRequest, CreateOrderResponse, PaymentDetailsResponse, VerifyPaymentRequest,
    VerifyPaymentResponse, DEFAULT_CURRENCY,
};
