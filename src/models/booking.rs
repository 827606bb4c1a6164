use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::payment::PaymentVerificationResult;
use crate::services::pricing::{AddOnSelection, PriceBreakdown, StayWindow};

/// Version of the booking payload this server understands.
pub const BOOKING_SCHEMA_VERSION: u32 = 1;

const REFERENCE_PREFIX: &str = "BK";
const REFERENCE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Draft,
    PendingPayment,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Draft => "draft",
            Self::PendingPayment => "pending_payment",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(value)
    }
}

/// Human-readable booking reference, e.g. `BK482913Q7ZK2M`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingReference(String);

impl BookingReference {
    /// `BK` + last six digits of the epoch milliseconds + six random
    /// uppercase base-36 characters.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis().rem_euclid(1_000_000);
        let mut rng = rand::thread_rng();
        let suffix: String = (0..6)
            .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
            .collect();
        Self(format!("{REFERENCE_PREFIX}{millis:06}{suffix}"))
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingTransitionError {
    #[error("payment signature was not verified")]
    NotVerified,
    #[error("booking has no order attached")]
    NoOrder,
    #[error("order mismatch: booking has {expected}, payment references {actual}")]
    OrderMismatch { expected: String, actual: String },
    #[error("amount mismatch: order was {expected} paisa, payment captured {actual}")]
    AmountMismatch { expected: i64, actual: i64 },
    #[error("booking already confirmed with payment {0}")]
    AlreadyConfirmed(String),
    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
}

/// Result of a successful confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    /// Same payment seen again (callback and webhook both arriving).
    AlreadyConfirmed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl GuestDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GuestCounts {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl GuestCounts {
    pub fn total(&self) -> u32 {
        self.adults + self.children + self.infants
    }
}

/// A stay as tracked by the booking store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[schema(value_type = String)]
    pub reference: BookingReference,
    pub guest: GuestDetails,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub nights: Option<u32>,
    pub guests: GuestCounts,
    pub selected_items: Vec<AddOnSelection>,
    pub special_requests: Option<String>,
    pub pricing: Option<PriceBreakdown>,
    /// Rupees
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub order_id: Option<String>,
    /// Paisa
    pub order_amount: Option<i64>,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Builds a draft from a validated payload. The reference falls back to a
    /// freshly generated one when the client did not send one.
    pub fn draft_from(data: &BookingData, pricing: Option<PriceBreakdown>, total: Decimal) -> Self {
        let now = Utc::now();
        let reference = data
            .booking_id
            .as_deref()
            .map(BookingReference::new)
            .unwrap_or_else(BookingReference::generate);

        Self {
            reference,
            guest: data.guest_details(),
            check_in: data.check_in.clone(),
            check_out: data.check_out.clone(),
            nights: pricing.as_ref().map(|p| p.nights),
            guests: data.guest_counts(),
            selected_items: data.selected_items.to_selections(),
            special_requests: data.special_requests.clone(),
            pricing,
            total_amount: total,
            status: BookingStatus::Draft,
            order_id: None,
            order_amount: None,
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copies the guest, stay and pricing snapshot of `draft` onto an open
    /// booking. When the total changes, the attached order no longer covers
    /// it: the order is detached, the booking drops back to draft and the
    /// detached order id is returned.
    pub fn refresh_snapshot(
        &mut self,
        draft: Booking,
    ) -> Result<Option<String>, BookingTransitionError> {
        if self.status.is_terminal() {
            return Err(BookingTransitionError::InvalidTransition {
                from: self.status,
                to: BookingStatus::Draft,
            });
        }

        let detached = if draft.total_amount != self.total_amount {
            self.order_amount = None;
            self.status = BookingStatus::Draft;
            self.order_id.take()
        } else {
            None
        };

        self.guest = draft.guest;
        self.check_in = draft.check_in;
        self.check_out = draft.check_out;
        self.nights = draft.nights;
        self.guests = draft.guests;
        self.selected_items = draft.selected_items;
        self.special_requests = draft.special_requests;
        self.pricing = draft.pricing;
        self.total_amount = draft.total_amount;
        self.updated_at = draft.updated_at;
        Ok(detached)
    }

    /// draft or pending_payment -> pending_payment. A retry attaches the new
    /// order in place of the previous one.
    pub fn attach_order(
        &mut self,
        order_id: &str,
        amount_minor: i64,
    ) -> Result<(), BookingTransitionError> {
        match self.status {
            BookingStatus::Draft | BookingStatus::PendingPayment => {
                self.order_id = Some(order_id.to_string());
                self.order_amount = Some(amount_minor);
                self.status = BookingStatus::PendingPayment;
                self.updated_at = Utc::now();
                Ok(())
            }
            from => Err(BookingTransitionError::InvalidTransition {
                from,
                to: BookingStatus::PendingPayment,
            }),
        }
    }

    /// pending_payment -> confirmed, gated on a verified signature for this
    /// booking's order. `captured_amount` is checked against the order amount
    /// when the caller knows it.
    pub fn confirm(
        &mut self,
        verification: &PaymentVerificationResult,
        captured_amount: Option<i64>,
    ) -> Result<Confirmation, BookingTransitionError> {
        if !verification.verified {
            return Err(BookingTransitionError::NotVerified);
        }

        match self.status {
            BookingStatus::Confirmed => {
                return match self.payment_id.as_deref() {
                    Some(existing) if existing == verification.payment_id => {
                        Ok(Confirmation::AlreadyConfirmed)
                    }
                    Some(existing) => Err(BookingTransitionError::AlreadyConfirmed(
                        existing.to_string(),
                    )),
                    None => Err(BookingTransitionError::InvalidTransition {
                        from: self.status,
                        to: BookingStatus::Confirmed,
                    }),
                };
            }
            BookingStatus::PendingPayment => {}
            from => {
                return Err(BookingTransitionError::InvalidTransition {
                    from,
                    to: BookingStatus::Confirmed,
                })
            }
        }

        let expected_order = self
            .order_id
            .as_deref()
            .ok_or(BookingTransitionError::NoOrder)?;
        if expected_order != verification.order_id {
            return Err(BookingTransitionError::OrderMismatch {
                expected: expected_order.to_string(),
                actual: verification.order_id.clone(),
            });
        }

        if let (Some(expected), Some(actual)) = (self.order_amount, captured_amount) {
            if expected != actual {
                return Err(BookingTransitionError::AmountMismatch { expected, actual });
            }
        }

        self.payment_id = Some(verification.payment_id.clone());
        self.status = BookingStatus::Confirmed;
        self.updated_at = Utc::now();
        Ok(Confirmation::Confirmed)
    }

    /// draft or pending_payment -> cancelled.
    pub fn cancel(&mut self) -> Result<(), BookingTransitionError> {
        if self.status.is_terminal() {
            return Err(BookingTransitionError::InvalidTransition {
                from: self.status,
                to: BookingStatus::Cancelled,
            });
        }
        self.status = BookingStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Add-on selections as the booking form sends them: either a list of
/// `{id, quantity}` records or an `{id: quantity}` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum SelectedItems {
    List(Vec<AddOnSelection>),
    Map(BTreeMap<String, u32>),
}

impl Default for SelectedItems {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl SelectedItems {
    pub fn to_selections(&self) -> Vec<AddOnSelection> {
        match self {
            Self::List(items) => items.clone(),
            Self::Map(items) => items
                .iter()
                .map(|(id, quantity)| AddOnSelection::new(id.clone(), *quantity))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::Map(items) => items.is_empty(),
        }
    }
}

/// Booking payload shared between the booking form and this server.
///
/// Unknown fields are ignored so the form can keep sending its display
/// extras (menu totals, nights, timestamps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingData {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[validate(length(min = 1, max = 64, message = "Booking id must be 1-64 characters"))]
    pub booking_id: Option<String>,

    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,

    pub check_in: Option<String>,
    pub check_out: Option<String>,

    #[serde(default, deserialize_with = "deserialize_count")]
    pub adults: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub children: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub infants: Option<u32>,

    #[validate(length(max = 1000))]
    pub special_requests: Option<String>,

    #[serde(default)]
    pub selected_items: SelectedItems,

    /// Client-computed total in rupees. Display hint only.
    #[schema(value_type = Option<f64>)]
    pub total_amount: Option<Decimal>,

    pub user_id: Option<String>,
    #[validate(email)]
    pub user_email: Option<String>,
}

fn default_schema_version() -> u32 {
    BOOKING_SCHEMA_VERSION
}

impl Default for BookingData {
    fn default() -> Self {
        Self {
            schema_version: BOOKING_SCHEMA_VERSION,
            booking_id: None,
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            check_in: None,
            check_out: None,
            adults: None,
            children: None,
            infants: None,
            special_requests: None,
            selected_items: SelectedItems::default(),
            total_amount: None,
            user_id: None,
            user_email: None,
        }
    }
}

fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    let allowed = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    if allowed && (7..=15).contains(&digits) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("Invalid phone number".into());
        Err(err)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountRepr {
    Number(u32),
    Text(String),
}

/// Counts arrive as numbers or as the strings a `<select>` produces.
fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<CountRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(CountRepr::Number(n)) => Ok(Some(n)),
        Some(CountRepr::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(CountRepr::Text(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid guest count '{s}'"))),
    }
}

impl BookingData {
    /// Field rules plus the cross-field ones: supported schema version and a
    /// consistent stay window.
    pub fn validate_payload(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if self.schema_version != BOOKING_SCHEMA_VERSION {
            let mut err = ValidationError::new("schema_version");
            err.message = Some(
                format!(
                    "Unsupported booking schema version {}; expected {}",
                    self.schema_version, BOOKING_SCHEMA_VERSION
                )
                .into(),
            );
            errors.add("schemaVersion", err);
        }

        match (&self.check_in, &self.check_out) {
            (Some(_), None) | (None, Some(_)) => {
                let mut err = ValidationError::new("stay_window");
                err.message = Some("Both checkIn and checkOut are required".into());
                errors.add("checkOut", err);
            }
            (Some(check_in), Some(check_out)) => {
                if let Err(e) = StayWindow::parse(check_in, check_out) {
                    let mut err = ValidationError::new("stay_window");
                    err.message = Some(e.to_string().into());
                    errors.add("checkOut", err);
                }
            }
            (None, None) => {}
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The stay window, when the payload carries one.
    pub fn stay_window(&self) -> Option<Result<StayWindow, crate::services::pricing::PricingError>> {
        match (&self.check_in, &self.check_out) {
            (Some(check_in), Some(check_out)) => Some(StayWindow::parse(check_in, check_out)),
            _ => None,
        }
    }

    pub fn guest_details(&self) -> GuestDetails {
        GuestDetails {
            first_name: self.first_name.clone().unwrap_or_default(),
            last_name: self.last_name.clone().unwrap_or_default(),
            email: self
                .email
                .clone()
                .or_else(|| self.user_email.clone())
                .unwrap_or_default(),
            phone: self.phone.clone().unwrap_or_default(),
        }
    }

    pub fn guest_counts(&self) -> GuestCounts {
        GuestCounts {
            adults: self.adults.unwrap_or(0),
            children: self.children.unwrap_or(0),
            infants: self.infants.unwrap_or(0),
        }
    }

    /// `"First Last"`, or `None` when neither name part is present.
    pub fn guest_name(&self) -> Option<String> {
        let name = self.guest_details().full_name();
        (!name.is_empty()).then_some(name)
    }
}
