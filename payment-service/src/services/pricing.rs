//! Checkout pricing.
//!
//! Pure arithmetic over course price and an optional validated discount.
//! No I/O; identical input always yields an identical quote.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// GST applied to the discounted subtotal.
pub const GST_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Flat,
}

/// A discount as returned by server-side validation.
#[derive(Debug, Clone, Deserialize)]
pub struct AppliedDiscount {
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub value: Decimal,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Course price must be greater than zero")]
    NonPositivePrice,
}

/// A fully priced checkout, all fields rounded to 2 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub original: Decimal,
    pub discount: Decimal,
    pub subtotal: Decimal,
    pub gst: Decimal,
    pub total: Decimal,
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Derive discount, subtotal, GST, and total from a course price.
///
/// The discount is clamped so the subtotal never goes negative; a flat
/// discount larger than the price reduces it to zero.
pub fn compute_quote(
    price: Decimal,
    discount: Option<&AppliedDiscount>,
) -> Result<Quote, PricingError> {
    if price <= Decimal::ZERO {
        return Err(PricingError::NonPositivePrice);
    }

    let original = round2(price);

    let raw_discount = match discount {
        None => Decimal::ZERO,
        Some(d) => match d.discount_type {
            DiscountType::Percentage => round2(original * d.value / Decimal::new(100, 0)),
            DiscountType::Flat => round2(d.value),
        },
    };

    let discount_amount = raw_discount.clamp(Decimal::ZERO, original);
    let subtotal = original - discount_amount;
    let gst = round2(subtotal * GST_RATE);
    let total = subtotal + gst;

    Ok(Quote {
        original,
        discount: discount_amount,
        subtotal,
        gst,
        total,
    })
}
