//! Property-based tests for pricing and signature handling.
//!
//! These use proptest to check invariants over many stays, amounts and
//! tampered inputs.

use chrono::{Duration, NaiveDate};
use homestay_payments::models::booking::BookingReference;
use homestay_payments::services::pricing::{
    compute_total, to_minor_units, PricedLineItem, StayWindow, DEFAULT_ROOM_PRICE_PER_NIGHT,
};
use homestay_payments::services::signature::{
    checkout_signature, verify_webhook_signature, webhook_signature, SignatureVerifier,
    WebhookVerification,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

const KEY_SECRET: &str = "prop_key_secret";
const WEBHOOK_SECRET: &str = "prop_webhook_secret";

// Strategies for generating test data
fn check_in_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..3650).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    })
}

fn add_on_strategy() -> impl Strategy<Value = Vec<PricedLineItem>> {
    prop::collection::vec(
        ("[a-z_]{3,12}", 50u32..2000, 0u32..6).prop_map(|(id, price, quantity)| PricedLineItem {
            item_id: id,
            unit_price: Decimal::from(price),
            quantity,
        }),
        0..5,
    )
}

fn gateway_id_strategy(prefix: &'static str) -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{14}".prop_map(move |s| format!("{prefix}_{s}"))
}

fn flip_hex(c: char) -> char {
    if c == '0' {
        '1'
    } else {
        '0'
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn whole_day_stays_price_per_night(
        check_in in check_in_strategy(),
        nights in 1u32..30,
        add_ons in add_on_strategy(),
    ) {
        let check_out = check_in + Duration::days(i64::from(nights));
        let stay = StayWindow::from_dates(check_in, check_out).unwrap();
        prop_assert_eq!(stay.nights(), nights);

        let quote = compute_total(&stay, DEFAULT_ROOM_PRICE_PER_NIGHT, &add_ons).unwrap();
        prop_assert_eq!(quote.room_subtotal, DEFAULT_ROOM_PRICE_PER_NIGHT * Decimal::from(nights));
        prop_assert_eq!(quote.total, quote.room_subtotal + quote.add_on_subtotal + quote.tax);
        prop_assert!(quote.tax >= Decimal::ZERO);
        prop_assert_eq!(quote.tax.fract(), Decimal::ZERO);
        prop_assert!(quote.line_items.iter().all(|item| item.quantity > 0));
    }

    #[test]
    fn checkout_dates_must_follow_check_in(
        check_in in check_in_strategy(),
        back in 0i64..30,
    ) {
        let check_out = check_in - Duration::days(back);
        prop_assert!(StayWindow::from_dates(check_in, check_out).is_err());
    }

    #[test]
    fn rupees_convert_exactly_to_paisa(rupees in 1i64..10_000_000, paisa in 0i64..100) {
        let amount = Decimal::new(rupees * 100 + paisa, 2);
        prop_assert_eq!(to_minor_units(amount), Some(rupees * 100 + paisa));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn any_single_character_change_breaks_the_checkout_signature(
        order_id in gateway_id_strategy("order"),
        payment_id in gateway_id_strategy("pay"),
        position in 0usize..64,
    ) {
        let verifier = SignatureVerifier::new(KEY_SECRET.to_string(), None);
        let signature = checkout_signature(KEY_SECRET, &order_id, &payment_id).unwrap();
        prop_assert!(verifier.verify(&order_id, &payment_id, &signature).unwrap().verified);

        let tampered: String = signature
            .chars()
            .enumerate()
            .map(|(i, c)| if i == position { flip_hex(c) } else { c })
            .collect();
        prop_assert!(!verifier.verify(&order_id, &payment_id, &tampered).unwrap().verified);
    }

    #[test]
    fn signature_for_one_payment_does_not_verify_another(
        order_id in gateway_id_strategy("order"),
        payment_id in gateway_id_strategy("pay"),
        other_payment in gateway_id_strategy("pay"),
    ) {
        prop_assume!(payment_id != other_payment);
        let verifier = SignatureVerifier::new(KEY_SECRET.to_string(), None);
        let signature = checkout_signature(KEY_SECRET, &order_id, &payment_id).unwrap();
        prop_assert!(!verifier.verify(&order_id, &other_payment, &signature).unwrap().verified);
    }

    #[test]
    fn tampered_webhook_bodies_are_rejected(
        body in prop::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let signature = webhook_signature(WEBHOOK_SECRET, &body).unwrap();
        prop_assert_eq!(
            verify_webhook_signature(&body, Some(&signature), Some(WEBHOOK_SECRET)).unwrap(),
            WebhookVerification::Verified
        );

        let mut tampered = body.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= mask;
        prop_assert_eq!(
            verify_webhook_signature(&tampered, Some(&signature), Some(WEBHOOK_SECRET)).unwrap(),
            WebhookVerification::Rejected
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn generated_booking_references_have_the_expected_shape(_seed in any::<u8>()) {
        let reference = BookingReference::generate();
        let value = reference.as_str();
        prop_assert_eq!(value.len(), 14);
        prop_assert!(value.starts_with("BK"));
        prop_assert!(value[2..8].chars().all(|c| c.is_ascii_digit()));
        prop_assert!(value[8..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
