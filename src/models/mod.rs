pub mod booking;
pub mod payment;

pub use booking::{
    Booking, BookingData, BookingReference, BookingStatus, BookingTransitionError, Confirmation,
    GuestCounts, GuestDetails, SelectedItems,
};
pub use payment::{PaymentOrder, PaymentSummary, PaymentVerificationResult};
