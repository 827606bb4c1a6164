pub mod gateway;
pub mod menu;
pub mod orders;
pub mod pricing;
pub mod signature;

pub use gateway::{PaymentGateway, RazorpayGateway};
pub use menu::MenuCatalog;
pub use orders::{OrderHandle, OrderPolicy, OrderService};
pub use pricing::{PriceBreakdown, PricingCalculator, StayWindow};
pub use signature::{SignatureVerifier, WebhookVerification};
