//! Order total assembly

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::coupon::CouponOutcome;
use crate::domain::services::shipping::{ShippingBreakdown, ShippingQuote};
use crate::domain::value_objects::Money;

/// Monetary figures frozen on an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// GST-inclusive sum of line totals.
    pub subtotal: Money,
    /// GST contained in `subtotal`. Informational, never added to the total.
    pub tax_amount: Money,
    pub shipping_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
}

/// Everything an order needs so receipts never re-derive pricing from live zone data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub totals: OrderTotals,
    pub shipping_breakdown: ShippingBreakdown,
    pub coupon: CouponOutcome,
}

impl PricingSnapshot {
    pub fn coupon_code(&self) -> Option<&str> { self.coupon.applied_code() }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledOrder {
    pub total_amount: Money,
    pub snapshot: PricingSnapshot,
}

#[derive(Clone, Copy, Debug)]
pub struct OrderTotalAssembler {
    gst_rate_percent: Decimal,
}

impl Default for OrderTotalAssembler {
    fn default() -> Self { Self::new(Decimal::from(18)) }
}

impl OrderTotalAssembler {
    pub fn new(gst_rate_percent: Decimal) -> Self { Self { gst_rate_percent: gst_rate_percent.max(Decimal::ZERO) } }

    /// GST portion of a GST-inclusive amount: `amount × rate / (100 + rate)`.
    pub fn included_gst(&self, amount: Money) -> Money {
        let rate = self.gst_rate_percent;
        (amount.clamp_non_negative() * (rate / (Decimal::ONE_HUNDRED + rate))).rounded()
    }

    /// `total = subtotal + shipping − discount`, never negative. A discount
    /// larger than the order is recorded at the order's gross value.
    pub fn assemble(&self, subtotal: Money, shipping: &ShippingQuote, coupon: &CouponOutcome) -> AssembledOrder {
        let subtotal = subtotal.clamp_non_negative();
        let gross = subtotal + shipping.amount;
        let discount_amount = coupon.discount().clamp_non_negative().min(gross);
        let total_amount = gross - discount_amount;

        AssembledOrder {
            total_amount,
            snapshot: PricingSnapshot {
                totals: OrderTotals {
                    subtotal,
                    tax_amount: self.included_gst(subtotal),
                    shipping_amount: shipping.amount,
                    discount_amount,
                    total_amount,
                },
                shipping_breakdown: shipping.breakdown.clone(),
                coupon: coupon.clone(),
            },
        }
    }
}
