use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::menu::MenuCatalog;

/// GST applied to the stay and add-ons.
pub const DEFAULT_TAX_RATE: Decimal = dec!(0.18);
/// Nightly rate for the cottage, in rupees.
pub const DEFAULT_ROOM_PRICE_PER_NIGHT: Decimal = dec!(2400);

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("check-out must be after check-in")]
    InvalidStay,
    #[error("invalid date '{0}'")]
    InvalidDate(String),
    #[error("unknown menu item '{0}'")]
    UnknownItem(String),
    #[error("amount out of range")]
    Overflow,
}

/// Check-in and check-out instants of a stay. Always has at least one night.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayWindow {
    check_in: NaiveDateTime,
    check_out: NaiveDateTime,
    nights: u32,
}

impl StayWindow {
    pub fn new(check_in: NaiveDateTime, check_out: NaiveDateTime) -> Result<Self, PricingError> {
        let nights = nights_between(check_in, check_out)?;
        Ok(Self {
            check_in,
            check_out,
            nights,
        })
    }

    pub fn from_dates(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, PricingError> {
        Self::new(
            check_in.and_time(NaiveTime::MIN),
            check_out.and_time(NaiveTime::MIN),
        )
    }

    /// Accepts the date strings a booking form sends: `YYYY-MM-DD`,
    /// RFC 3339 timestamps, or naive `YYYY-MM-DDTHH:MM[:SS]`.
    pub fn parse(check_in: &str, check_out: &str) -> Result<Self, PricingError> {
        Self::new(parse_instant(check_in)?, parse_instant(check_out)?)
    }

    pub fn check_in(&self) -> NaiveDateTime {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDateTime {
        self.check_out
    }

    pub fn nights(&self) -> u32 {
        self.nights
    }
}

fn parse_instant(raw: &str) -> Result<NaiveDateTime, PricingError> {
    let value = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| PricingError::InvalidDate(raw.to_string()))
}

/// Whole nights covered by the stay; a partial day counts as a full night.
pub fn nights_between(
    check_in: NaiveDateTime,
    check_out: NaiveDateTime,
) -> Result<u32, PricingError> {
    let seconds = (check_out - check_in).num_seconds();
    if seconds <= 0 {
        return Err(PricingError::InvalidStay);
    }
    let nights = (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    u32::try_from(nights).map_err(|_| PricingError::Overflow)
}

/// Item id and quantity as chosen by the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AddOnSelection {
    pub id: String,
    pub quantity: u32,
}

impl AddOnSelection {
    pub fn new(id: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: id.into(),
            quantity,
        }
    }
}

/// A selection resolved against a price table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricedLineItem {
    pub item_id: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl PricedLineItem {
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub nights: u32,
    pub room_subtotal: Decimal,
    pub add_on_subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_items: Vec<PricedLineItem>,
}

impl PriceBreakdown {
    /// Total in paisa, as the gateway expects it.
    pub fn total_minor_units(&self) -> Result<i64, PricingError> {
        to_minor_units(self.total).ok_or(PricingError::Overflow)
    }
}

/// `round(amount * 100)` as an integer, or `None` when it does not fit.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(dec!(100))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Prices a stay at the default tax rate.
pub fn compute_total(
    stay: &StayWindow,
    room_price_per_night: Decimal,
    add_ons: &[PricedLineItem],
) -> Result<PriceBreakdown, PricingError> {
    compute_total_with_rate(stay, room_price_per_night, add_ons, DEFAULT_TAX_RATE)
}

pub fn compute_total_with_rate(
    stay: &StayWindow,
    room_price_per_night: Decimal,
    add_ons: &[PricedLineItem],
    tax_rate: Decimal,
) -> Result<PriceBreakdown, PricingError> {
    let room_subtotal = room_price_per_night
        .checked_mul(Decimal::from(stay.nights()))
        .ok_or(PricingError::Overflow)?;

    let line_items: Vec<PricedLineItem> = add_ons
        .iter()
        .filter(|item| item.quantity > 0)
        .cloned()
        .collect();

    let mut add_on_subtotal = Decimal::ZERO;
    for item in &line_items {
        let line = item.line_total().ok_or(PricingError::Overflow)?;
        add_on_subtotal = add_on_subtotal
            .checked_add(line)
            .ok_or(PricingError::Overflow)?;
    }

    let subtotal = room_subtotal
        .checked_add(add_on_subtotal)
        .ok_or(PricingError::Overflow)?;
    let tax = tax_rate
        .checked_mul(subtotal)
        .ok_or(PricingError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let total = subtotal.checked_add(tax).ok_or(PricingError::Overflow)?;

    Ok(PriceBreakdown {
        nights: stay.nights(),
        room_subtotal,
        add_on_subtotal,
        tax,
        total,
        line_items,
    })
}

/// Quotes stays from the configured room rate and the menu catalog.
#[derive(Debug, Clone)]
pub struct PricingCalculator {
    room_price_per_night: Decimal,
    tax_rate: Decimal,
    catalog: MenuCatalog,
}

impl PricingCalculator {
    pub fn new(room_price_per_night: Decimal, tax_rate: Decimal, catalog: MenuCatalog) -> Self {
        Self {
            room_price_per_night,
            tax_rate,
            catalog,
        }
    }

    pub fn room_price_per_night(&self) -> Decimal {
        self.room_price_per_night
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn catalog(&self) -> &MenuCatalog {
        &self.catalog
    }

    /// Resolves selections against the catalog and prices the stay.
    /// Zero quantities are dropped before lookup.
    pub fn quote(
        &self,
        stay: &StayWindow,
        selections: &[AddOnSelection],
    ) -> Result<PriceBreakdown, PricingError> {
        let priced = selections
            .iter()
            .filter(|sel| sel.quantity > 0)
            .map(|sel| {
                self.catalog
                    .price_of(&sel.id)
                    .map(|unit_price| PricedLineItem {
                        item_id: sel.id.clone(),
                        unit_price,
                        quantity: sel.quantity,
                    })
                    .ok_or_else(|| PricingError::UnknownItem(sel.id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        compute_total_with_rate(stay, self.room_price_per_night, &priced, self.tax_rate)
    }
}

impl Default for PricingCalculator {
    fn default() -> Self {
        Self::new(
            DEFAULT_ROOM_PRICE_PER_NIGHT,
            DEFAULT_TAX_RATE,
            MenuCatalog::standard(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn stay(check_in: &str, check_out: &str) -> StayWindow {
        StayWindow::parse(check_in, check_out).unwrap()
    }

    #[rstest]
    #[case("2025-01-10", "2025-01-11", 1)]
    #[case("2025-01-10", "2025-01-13", 3)]
    #[case("2025-01-10T14:00:00", "2025-01-11T11:00:00", 1)]
    #[case("2025-01-10T12:00:00", "2025-01-11T13:00:00", 2)]
    #[case("2025-01-10T00:00:00Z", "2025-01-12T00:00:00+00:00", 2)]
    fn nights_round_partial_days_up(
        #[case] check_in: &str,
        #[case] check_out: &str,
        #[case] expected: u32,
    ) {
        assert_eq!(stay(check_in, check_out).nights(), expected);
    }

    #[rstest]
    #[case("2025-01-10", "2025-01-10")]
    #[case("2025-01-12", "2025-01-10")]
    fn check_out_must_follow_check_in(#[case] check_in: &str, #[case] check_out: &str) {
        assert_eq!(
            StayWindow::parse(check_in, check_out),
            Err(PricingError::InvalidStay)
        );
    }

    #[test]
    fn garbage_dates_rejected() {
        assert_matches!(
            StayWindow::parse("next tuesday", "2025-01-10"),
            Err(PricingError::InvalidDate(raw)) if raw == "next tuesday"
        );
    }

    #[test]
    fn single_night_without_add_ons() {
        let quote = PricingCalculator::default()
            .quote(&stay("2025-03-01", "2025-03-02"), &[])
            .unwrap();
        assert_eq!(quote.nights, 1);
        assert_eq!(quote.room_subtotal, dec!(2400));
        assert_eq!(quote.add_on_subtotal, Decimal::ZERO);
        assert_eq!(quote.tax, dec!(432));
        assert_eq!(quote.total, dec!(2832));
        assert_eq!(quote.total_minor_units().unwrap(), 283_200);
    }

    #[test]
    fn add_ons_priced_from_catalog() {
        let selections = vec![
            AddOnSelection::new("masala-tea", 2),
            AddOnSelection::new("potato-paratha", 1),
            AddOnSelection::new("mutton-korma", 0),
        ];
        let quote = PricingCalculator::default()
            .quote(&stay("2025-03-01", "2025-03-03"), &selections)
            .unwrap();
        assert_eq!(quote.room_subtotal, dec!(4800));
        assert_eq!(quote.add_on_subtotal, dec!(200));
        assert_eq!(quote.tax, dec!(900));
        assert_eq!(quote.total, dec!(5900));
        assert_eq!(quote.line_items.len(), 2);
    }

    #[test]
    fn unknown_item_rejected() {
        let err = PricingCalculator::default()
            .quote(
                &stay("2025-03-01", "2025-03-02"),
                &[AddOnSelection::new("lobster", 1)],
            )
            .unwrap_err();
        assert_eq!(err, PricingError::UnknownItem("lobster".into()));
    }

    #[test]
    fn tax_rounds_half_away_from_zero() {
        // 18% of 25 is 4.5
        let quote = compute_total(&stay("2025-03-01", "2025-03-02"), dec!(25), &[]).unwrap();
        assert_eq!(quote.tax, dec!(5));
        assert_eq!(quote.total, dec!(30));
    }

    #[test]
    fn configured_tax_rate_applies() {
        let calculator = PricingCalculator::new(dec!(1000), dec!(0.12), MenuCatalog::standard());
        let quote = calculator
            .quote(&stay("2025-03-01", "2025-03-02"), &[])
            .unwrap();
        assert_eq!(quote.tax, dec!(120));
        assert_eq!(quote.total, dec!(1120));
    }

    #[test]
    fn minor_units_round_fractional_paisa() {
        assert_eq!(to_minor_units(dec!(2832)), Some(283_200));
        assert_eq!(to_minor_units(dec!(10.005)), Some(1_001));
        assert_eq!(to_minor_units(dec!(0.004)), Some(0));
    }
}
