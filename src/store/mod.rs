use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::errors::ServiceError;
use crate::models::booking::{Booking, BookingTransitionError, Confirmation};
use crate::models::payment::PaymentVerificationResult;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("booking {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Transition(#[from] BookingTransitionError),
    #[error("booking store unavailable: {0}")]
    Backend(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(reference) => {
                ServiceError::NotFound(format!("Booking {reference} not found"))
            }
            StoreError::Transition(e) => ServiceError::BookingStateConflict(e.to_string()),
            StoreError::Backend(e) => ServiceError::InternalError(e),
        }
    }
}

/// Draft and confirmed bookings, keyed by booking reference.
#[async_trait]
pub trait BookingRecordStore: Send + Sync {
    /// Inserts a draft, or refreshes the guest, stay and pricing snapshot of
    /// an open booking with the same reference. Status and order are kept
    /// unless the total changed, in which case the order is detached and the
    /// booking is back to draft.
    async fn save_draft(&self, booking: Booking) -> Result<Booking, StoreError>;

    async fn get(&self, reference: &str) -> Result<Option<Booking>, StoreError>;

    async fn find_by_order(&self, order_id: &str) -> Result<Option<Booking>, StoreError>;

    async fn attach_order(
        &self,
        reference: &str,
        order_id: &str,
        amount_minor: i64,
    ) -> Result<Booking, StoreError>;

    async fn confirm(
        &self,
        reference: &str,
        verification: &PaymentVerificationResult,
        captured_amount: Option<i64>,
    ) -> Result<(Booking, Confirmation), StoreError>;

    async fn cancel(&self, reference: &str) -> Result<Booking, StoreError>;
}

/// Process-local store. Each booking is mutated under its map shard lock, so
/// transitions on one booking are serialized.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<DashMap<String, Booking>>,
    orders: Arc<DashMap<String, String>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }
}

#[async_trait]
impl BookingRecordStore for InMemoryBookingStore {
    async fn save_draft(&self, booking: Booking) -> Result<Booking, StoreError> {
        let reference = booking.reference.as_str().to_string();
        match self.bookings.entry(reference) {
            Entry::Vacant(slot) => {
                debug!(booking_id = %slot.key(), "draft booking stored");
                Ok(slot.insert(booking).value().clone())
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if let Some(order_id) = existing.refresh_snapshot(booking)? {
                    self.orders.remove(&order_id);
                    info!(
                        booking_id = %existing.reference,
                        order_id = %order_id,
                        "booking repriced; previous order detached"
                    );
                }
                Ok(existing.clone())
            }
        }
    }

    async fn get(&self, reference: &str) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.get(reference).map(|b| b.value().clone()))
    }

    async fn find_by_order(&self, order_id: &str) -> Result<Option<Booking>, StoreError> {
        let Some(reference) = self.orders.get(order_id).map(|r| r.value().clone()) else {
            return Ok(None);
        };
        Ok(self
            .bookings
            .get(&reference)
            .map(|b| b.value().clone())
            .filter(|b| b.order_id.as_deref() == Some(order_id)))
    }

    async fn attach_order(
        &self,
        reference: &str,
        order_id: &str,
        amount_minor: i64,
    ) -> Result<Booking, StoreError> {
        let mut booking = self
            .bookings
            .get_mut(reference)
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))?;

        let previous = booking.order_id.clone();
        booking.attach_order(order_id, amount_minor)?;
        if let Some(previous) = previous.filter(|p| p != order_id) {
            self.orders.remove(&previous);
        }
        self.orders
            .insert(order_id.to_string(), reference.to_string());

        info!(booking_id = %reference, order_id = %order_id, "order attached to booking");
        Ok(booking.clone())
    }

    async fn confirm(
        &self,
        reference: &str,
        verification: &PaymentVerificationResult,
        captured_amount: Option<i64>,
    ) -> Result<(Booking, Confirmation), StoreError> {
        let mut booking = self
            .bookings
            .get_mut(reference)
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))?;

        let outcome = booking.confirm(verification, captured_amount)?;
        if outcome == Confirmation::Confirmed {
            info!(
                booking_id = %reference,
                order_id = %verification.order_id,
                payment_id = %verification.payment_id,
                "booking confirmed"
            );
        }
        Ok((booking.clone(), outcome))
    }

    async fn cancel(&self, reference: &str) -> Result<Booking, StoreError> {
        let mut booking = self
            .bookings
            .get_mut(reference)
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))?;
        booking.cancel()?;
        info!(booking_id = %reference, "booking cancelled");
        Ok(booking.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::{BookingData, BookingStatus};
    use assert_matches::assert_matches;
    use rust_decimal::Decimal;

    fn draft(reference: &str) -> Booking {
        let data = BookingData {
            booking_id: Some(reference.to_string()),
            first_name: Some("Asha".into()),
            ..Default::default()
        };
        Booking::draft_from(&data, None, Decimal::from(2832))
    }

    fn verified(order_id: &str, payment_id: &str) -> PaymentVerificationResult {
        PaymentVerificationResult {
            order_id: order_id.into(),
            payment_id: payment_id.into(),
            verified: true,
        }
    }

    #[tokio::test]
    async fn draft_to_confirmed() {
        let store = InMemoryBookingStore::new();
        store.save_draft(draft("BK1")).await.unwrap();
        store.attach_order("BK1", "order_1", 283_200).await.unwrap();

        let found = store.find_by_order("order_1").await.unwrap().unwrap();
        assert_eq!(found.status, BookingStatus::PendingPayment);

        let (booking, outcome) = store
            .confirm("BK1", &verified("order_1", "pay_1"), None)
            .await
            .unwrap();
        assert_eq!(outcome, Confirmation::Confirmed);
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn retry_reindexes_order() {
        let store = InMemoryBookingStore::new();
        store.save_draft(draft("BK1")).await.unwrap();
        store.attach_order("BK1", "order_1", 100).await.unwrap();
        store.attach_order("BK1", "order_2", 100).await.unwrap();

        assert!(store.find_by_order("order_1").await.unwrap().is_none());
        assert!(store.find_by_order("order_2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn resaving_open_draft_keeps_order() {
        let store = InMemoryBookingStore::new();
        store.save_draft(draft("BK1")).await.unwrap();
        store.attach_order("BK1", "order_1", 100).await.unwrap();

        let mut updated = draft("BK1");
        updated.guest.first_name = "Meera".into();
        let saved = store.save_draft(updated).await.unwrap();
        assert_eq!(saved.guest.first_name, "Meera");
        assert_eq!(saved.order_id.as_deref(), Some("order_1"));
        assert_eq!(saved.status, BookingStatus::PendingPayment);
    }

    #[tokio::test]
    async fn repricing_an_open_booking_unindexes_its_order() {
        let store = InMemoryBookingStore::new();
        store.save_draft(draft("BK1")).await.unwrap();
        store.attach_order("BK1", "order_1", 283_200).await.unwrap();

        let mut repriced = draft("BK1");
        repriced.total_amount = Decimal::from(28_320);
        let saved = store.save_draft(repriced).await.unwrap();
        assert_eq!(saved.status, BookingStatus::Draft);
        assert_eq!(saved.order_id, None);
        assert!(store.find_by_order("order_1").await.unwrap().is_none());

        assert_matches!(
            store.confirm("BK1", &verified("order_1", "pay_1"), None).await,
            Err(StoreError::Transition(_))
        );
    }

    #[tokio::test]
    async fn confirmed_booking_cannot_be_redrafted_or_cancelled() {
        let store = InMemoryBookingStore::new();
        store.save_draft(draft("BK1")).await.unwrap();
        store.attach_order("BK1", "order_1", 100).await.unwrap();
        store
            .confirm("BK1", &verified("order_1", "pay_1"), Some(100))
            .await
            .unwrap();

        assert_matches!(
            store.save_draft(draft("BK1")).await,
            Err(StoreError::Transition(_))
        );
        assert_matches!(store.cancel("BK1").await, Err(StoreError::Transition(_)));
    }

    #[tokio::test]
    async fn unknown_booking_is_not_found() {
        let store = InMemoryBookingStore::new();
        assert_matches!(
            store.attach_order("BK404", "order_1", 100).await,
            Err(StoreError::NotFound(_))
        );
        assert!(store.get("BK404").await.unwrap().is_none());
    }
}
