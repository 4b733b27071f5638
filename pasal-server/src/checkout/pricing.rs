//! Server-side order pricing. Client-submitted totals are never trusted;
//! every amount is recomputed from catalog prices at checkout time.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use shared::models::OrderLine;

/// Orders at or above this subtotal ship free.
fn free_shipping_threshold() -> Decimal {
    Decimal::new(50, 0)
}

fn flat_shipping_fee() -> Decimal {
    Decimal::new(999, 2)
}

/// Sales tax rate, 8%.
fn tax_rate() -> Decimal {
    Decimal::new(8, 2)
}

pub fn subtotal(lines: &[OrderLine]) -> Decimal {
    lines.iter().map(OrderLine::subtotal).sum()
}

pub fn shipping_fee(subtotal: Decimal) -> Decimal {
    if subtotal >= free_shipping_threshold() {
        Decimal::ZERO
    } else {
        flat_shipping_fee()
    }
}

pub fn tax(subtotal: Decimal) -> Decimal {
    (subtotal * tax_rate()).round_dp(2)
}

/// Subtotal + shipping + tax, rounded to cents.
pub fn grand_total(lines: &[OrderLine]) -> Decimal {
    let sub = subtotal(lines);
    (sub + shipping_fee(sub) + tax(sub)).round_dp(2)
}

/// Convert a major-unit amount to gateway minor units (paisa).
/// Returns None when the amount does not fit an i64 after scaling.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::new(100, 0)).round_dp(0).to_i64()
}
