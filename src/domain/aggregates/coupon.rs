//! Coupon Aggregate
//!
//! Eligibility (expiry, usage caps, minimum order) is decided by the coupon
//! validation service. This module only models the admin rule and turns a
//! validation result into the discount checkout applies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType { Percentage, Fixed }

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "percentage", Self::Fixed => "fixed" }
    }
    pub fn parse(value: &str) -> Option<Self> {
        match value { "percentage" => Some(Self::Percentage), "fixed" => Some(Self::Fixed), _ => None }
    }
}

/// Admin-defined discount rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Money,
    pub minimum_order_amount: Money,
    pub maximum_discount: Option<Money>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub per_user_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Answer from the coupon validation service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponValidation {
    pub valid: bool,
    pub discount_amount: Money,
    pub message: String,
}

/// Coupon codes are matched trimmed and upper-cased; blank means no coupon.
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim();
    (!code.is_empty()).then(|| code.to_uppercase())
}

/// What a coupon contributes to an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CouponOutcome {
    NotApplied,
    Applied { code: String, discount: Money, message: String },
    Rejected { code: String, message: String },
}

impl CouponOutcome {
    /// A valid result's discount is bounded to `[0, subtotal]`; an invalid one discounts nothing.
    pub fn from_validation(code: impl Into<String>, validation: CouponValidation, subtotal: Money) -> Self {
        let code = code.into();
        if !validation.valid {
            return Self::Rejected { code, message: validation.message };
        }
        let discount = validation.discount_amount.clamp_non_negative().min(subtotal.clamp_non_negative());
        Self::Applied { code, discount, message: validation.message }
    }

    pub fn discount(&self) -> Money {
        match self { Self::Applied { discount, .. } => *discount, _ => Money::ZERO }
    }

    pub fn applied_code(&self) -> Option<&str> {
        match self { Self::Applied { code, .. } => Some(code), _ => None }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::NotApplied => None,
            Self::Applied { message, .. } | Self::Rejected { message, .. } => Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation(valid: bool, amount: i64, message: &str) -> CouponValidation {
        CouponValidation { valid, discount_amount: Money::rupees(amount), message: message.into() }
    }

    #[test]
    fn test_invalid_coupon_discounts_nothing() {
        let outcome = CouponOutcome::from_validation("FESTIVE10", validation(false, 800, "This coupon has expired"), Money::rupees(8000));
        assert_eq!(outcome.discount(), Money::ZERO);
        assert_eq!(outcome.applied_code(), None);
        assert_eq!(outcome.message(), Some("This coupon has expired"));
    }

    #[test]
    fn test_valid_coupon_uses_service_amount() {
        let outcome = CouponOutcome::from_validation("FESTIVE10", validation(true, 800, "Coupon applied successfully"), Money::rupees(8000));
        assert_eq!(outcome.discount(), Money::rupees(800));
        assert_eq!(outcome.applied_code(), Some("FESTIVE10"));
    }

    #[test]
    fn test_discount_bounded_by_subtotal() {
        let outcome = CouponOutcome::from_validation("FLAT5000", validation(true, 5000, "ok"), Money::rupees(3000));
        assert_eq!(outcome.discount(), Money::rupees(3000));
        let negative = CouponOutcome::from_validation("ODD", validation(true, -50, "ok"), Money::rupees(3000));
        assert_eq!(negative.discount(), Money::ZERO);
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  welcome500 "), Some("WELCOME500".to_string()));
        assert_eq!(normalize_code("   "), None);
    }

    #[test]
    fn test_discount_type_round_trip_names() {
        assert_eq!(DiscountType::parse("percentage"), Some(DiscountType::Percentage));
        assert_eq!(DiscountType::Fixed.as_str(), "fixed");
        assert_eq!(DiscountType::parse("bogo"), None);
    }
}
