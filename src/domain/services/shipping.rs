//! Shipping amount calculation
//!
//! Pure and deterministic. Free shipping waives the base rate once the
//! order meets the threshold, but never the per-km charge beyond the free
//! radius.

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::shipping_zone::{ShippingDefaults, ShippingSettings, ShippingZone};
use crate::domain::value_objects::{Kilometers, Money};

/// Itemized shipping charge, snapshotted onto the order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingBreakdown {
    /// Distance as requested, before the zone's cap.
    pub requested_distance_km: Kilometers,
    /// Distance used for pricing.
    pub distance_km: Kilometers,
    pub distance_free_radius: Kilometers,
    pub distance_charged: Kilometers,
    pub per_km_rate: Money,
    pub distance_charge: Money,
    pub base_charge: Money,
    /// Threshold met and delivery within the free radius. A zone with no
    /// threshold (null or zero) never reports free shipping, even though a
    /// zero threshold would otherwise be met by every cart.
    pub is_free_shipping: bool,
    pub order_value: Money,
    pub free_shipping_threshold: Option<Money>,
    pub total_shipping_charge: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub amount: Money,
    pub breakdown: ShippingBreakdown,
}

#[derive(Clone, Debug, Default)]
pub struct ShippingCalculator {
    defaults: ShippingDefaults,
}

impl ShippingCalculator {
    pub fn new(defaults: ShippingDefaults) -> Self { Self { defaults } }

    pub fn calculate(&self, cart_total: Money, distance: Kilometers, zones: &[ShippingZone]) -> ShippingQuote {
        quote(&ShippingSettings::resolve(zones, &self.defaults), cart_total, distance)
    }
}

/// Prices one delivery against already-resolved settings.
pub fn quote(settings: &ShippingSettings, cart_total: Money, distance: Kilometers) -> ShippingQuote {
    let order_value = cart_total.clamp_non_negative();
    let distance_km = match settings.max_shipping_distance {
        Some(max) => distance.min(max),
        None => distance,
    };
    let radius = settings.distance_free_radius;
    let distance_charged = distance_km.saturating_sub(radius);

    let distance_charge = if distance_km > radius {
        (settings.per_km_rate * distance_charged.value()).rounded()
    } else {
        Money::ZERO
    };

    let threshold_met = settings.free_shipping_threshold.is_some_and(|t| order_value >= t);
    let base_charge = if threshold_met { Money::ZERO } else { settings.base_rate };
    let total = base_charge + distance_charge;

    ShippingQuote {
        amount: total,
        breakdown: ShippingBreakdown {
            requested_distance_km: distance,
            distance_km,
            distance_free_radius: radius,
            distance_charged,
            per_km_rate: settings.per_km_rate,
            distance_charge,
            base_charge,
            is_free_shipping: threshold_met && distance_km <= radius,
            order_value,
            free_shipping_threshold: settings.free_shipping_threshold,
            total_shipping_charge: total,
        },
    }
}
