//! Value Objects for checkout pricing

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};

/// SKU (Stock Keeping Unit) captured on order lines
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SkuError { Empty, TooLong }
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "SKU empty"), Self::TooLong => write!(f, "SKU longer than 50 characters") }
    }
}

/// Amount in Indian rupees. Catalogue prices are GST-inclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    /// Largest amount an order column (`NUMERIC(12, 2)`) can hold.
    pub const MAX_ORDER_VALUE: Money = Money(Decimal::from_parts(3_567_587_327, 232, 0, false, 2));

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn rupees(amount: i64) -> Self { Self(Decimal::from(amount)) }

    /// NaN, infinities and negatives become zero. Finite amounts past the
    /// decimal range saturate at `Decimal::MAX`.
    pub fn from_f64(value: f64) -> Self {
        Self(decimal_from_f64(value)).clamp_non_negative().rounded()
    }

    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }
    pub fn is_positive(&self) -> bool { self.0 > Decimal::ZERO }
    pub fn exceeds_order_limit(&self) -> bool { *self > Self::MAX_ORDER_VALUE }

    pub fn clamp_non_negative(self) -> Self { Self(self.0.max(Decimal::ZERO)) }

    /// Rounds to paise, half away from zero.
    pub fn rounded(self) -> Self { Self(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)) }

    /// Subtraction floored at zero.
    pub fn saturating_sub(self, other: Money) -> Money { Self(self.0.saturating_sub(other.0).max(Decimal::ZERO)) }

    pub fn multiply(&self, qty: u32) -> Money { Money(self.0.saturating_mul(Decimal::from(qty))) }

    pub fn inr(&self) -> String { format_inr(self.0) }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0.saturating_add(rhs.0)) }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money { Money(self.0.saturating_sub(rhs.0)) }
}

impl Mul<Decimal> for Money {
    type Output = Money;
    fn mul(self, rhs: Decimal) -> Money { Money(self.0.saturating_mul(rhs)) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self { Self(amount) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.inr()) }
}

/// NaN and infinities map to zero; finite values outside the decimal range saturate.
fn decimal_from_f64(value: f64) -> Decimal {
    if !value.is_finite() { return Decimal::ZERO; }
    Decimal::from_f64(value).unwrap_or(if value > 0.0 { Decimal::MAX } else { Decimal::MIN })
}

/// Renders an amount as whole rupees with Indian digit grouping, e.g. `₹1,23,456`.
pub fn format_inr(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().to_i128().unwrap_or_default().to_string();
    let (mut head, tail) = digits.split_at(digits.len().saturating_sub(3));

    let mut groups = Vec::new();
    while head.len() > 2 {
        let (rest, group) = head.split_at(head.len() - 2);
        groups.push(group);
        head = rest;
    }
    if !head.is_empty() { groups.push(head); }
    groups.reverse();
    groups.push(tail);

    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    format!("{sign}₹{}", groups.join(","))
}

/// Delivery distance. Never negative, capped at [`Kilometers::MAX`], kept to metre precision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kilometers(Decimal);

impl Kilometers {
    pub const ZERO: Kilometers = Kilometers(Decimal::ZERO);

    /// Longer than any road delivery; anything further is priced as this far.
    pub const MAX: Kilometers = Kilometers(Decimal::from_parts(100_000, 0, 0, false, 0));

    pub fn new(value: Decimal) -> Self { Self(value.clamp(Decimal::ZERO, Self::MAX.0).round_dp(3)) }
    pub fn whole(km: u32) -> Self { Self::new(Decimal::from(km)) }

    /// NaN, infinities and negatives become zero.
    pub fn from_f64(value: f64) -> Self { Self::new(decimal_from_f64(value)) }

    pub fn value(&self) -> Decimal { self.0 }
    pub fn saturating_sub(self, other: Kilometers) -> Kilometers { Self((self.0 - other.0).max(Decimal::ZERO)) }
}

impl fmt::Display for Kilometers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} km", self.0.normalize()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() { let sku = Sku::new(" sofa-3s-teak ").unwrap(); assert_eq!(sku.as_str(), "SOFA-3S-TEAK"); }
    #[test]
    fn test_sku_rejects_blank() { assert_eq!(Sku::new("   "), Err(SkuError::Empty)); }
    #[test]
    fn test_format_inr_grouping() {
        assert_eq!(format_inr(Decimal::from(999)), "₹999");
        assert_eq!(format_inr(Decimal::from(12000)), "₹12,000");
        assert_eq!(format_inr(Decimal::from(123456)), "₹1,23,456");
        assert_eq!(format_inr(Decimal::from(10_000_000)), "₹1,00,00,000");
        assert_eq!(format_inr(Decimal::new(124950, 2)), "₹1,250");
        assert_eq!(format_inr(Decimal::from(-1500)), "-₹1,500");
    }
    #[test]
    fn test_money_from_f64_normalizes() {
        assert_eq!(Money::from_f64(f64::NAN), Money::ZERO);
        assert_eq!(Money::from_f64(-20.0), Money::ZERO);
        assert_eq!(Money::from_f64(f64::INFINITY), Money::ZERO);
        assert_eq!(Money::from_f64(499.5).amount(), Decimal::new(4995, 1));
    }
    #[test]
    fn test_money_saturating_sub() {
        assert_eq!(Money::rupees(100).saturating_sub(Money::rupees(250)), Money::ZERO);
        assert_eq!(Money::rupees(300).saturating_sub(Money::rupees(250)), Money::rupees(50));
    }
    #[test]
    fn test_kilometers_normalizes() {
        assert_eq!(Kilometers::from_f64(-3.0), Kilometers::ZERO);
        assert_eq!(Kilometers::from_f64(f64::NAN), Kilometers::ZERO);
        assert_eq!(Kilometers::from_f64(7.25).value(), Decimal::new(725, 2));
        assert_eq!(Kilometers::whole(3).saturating_sub(Kilometers::whole(5)), Kilometers::ZERO);
    }
    #[test]
    fn test_large_values_saturate() {
        assert_eq!(Kilometers::from_f64(1e28), Kilometers::MAX);
        assert_eq!(Kilometers::from_f64(1e300), Kilometers::MAX);
        assert_eq!(Kilometers::from_f64(f64::INFINITY), Kilometers::ZERO);
        assert_eq!(Kilometers::whole(u32::MAX), Kilometers::MAX);

        let huge = Money::from_f64(1e30);
        assert_eq!(huge.amount(), Decimal::MAX);
        assert!(huge.exceeds_order_limit());
        assert_eq!(huge + huge, huge);
        assert_eq!(huge.multiply(100), huge);
        assert_eq!(huge * Decimal::from(50), huge);
        assert_eq!(Money::ZERO.saturating_sub(huge), Money::ZERO);
    }
    #[test]
    fn test_order_limit_matches_column() {
        assert_eq!(Money::MAX_ORDER_VALUE.amount(), Decimal::new(999_999_999_999, 2));
        assert!(!Money::MAX_ORDER_VALUE.exceeds_order_limit());
        assert!((Money::MAX_ORDER_VALUE + Money::new(Decimal::new(1, 2))).exceeds_order_limit());
    }
}
