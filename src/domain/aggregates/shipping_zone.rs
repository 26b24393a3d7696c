//! Shipping Zone Aggregate
//!
//! Admins keep a list of zones; exactly one of them is meant to be active.
//! Checkout never reads a zone directly: it resolves the list once into
//! [`ShippingSettings`], a fully-defaulted view the calculator works from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Kilometers, Money};
use crate::StorefrontError;

/// Admin-maintained shipping policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingZone {
    pub id: Uuid,
    pub name: String,
    pub base_rate: Option<Money>,
    pub per_km_rate: Option<Money>,
    /// `None` or zero disables threshold-based free shipping.
    pub free_shipping_threshold: Option<Money>,
    pub distance_free_radius: Option<Kilometers>,
    pub max_shipping_distance: Option<Kilometers>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShippingZone {
    /// Inactive zone with every rate unset.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), name: name.into(), base_rate: None, per_km_rate: None,
            free_shipping_threshold: None, distance_free_radius: None, max_shipping_distance: None,
            is_active: false, created_at: now, updated_at: now,
        }
    }
}

/// Fallback values used when no zone is active or an active zone leaves a field unset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDefaults {
    pub base_rate: Money,
    pub per_km_rate: Money,
    pub free_shipping_threshold: Money,
    pub distance_free_radius: Kilometers,
}

impl Default for ShippingDefaults {
    fn default() -> Self {
        Self {
            base_rate: Money::rupees(500),
            per_km_rate: Money::rupees(50),
            free_shipping_threshold: Money::rupees(10_000),
            distance_free_radius: Kilometers::whole(5),
        }
    }
}

/// Effective shipping policy for one calculation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSettings {
    pub zone_id: Option<Uuid>,
    pub base_rate: Money,
    pub per_km_rate: Money,
    pub free_shipping_threshold: Option<Money>,
    pub distance_free_radius: Kilometers,
    pub max_shipping_distance: Option<Kilometers>,
}

impl ShippingSettings {
    pub fn from_defaults(defaults: &ShippingDefaults) -> Self {
        Self {
            zone_id: None,
            base_rate: defaults.base_rate.clamp_non_negative(),
            per_km_rate: defaults.per_km_rate.clamp_non_negative(),
            free_shipping_threshold: Some(defaults.free_shipping_threshold).filter(Money::is_positive),
            distance_free_radius: defaults.distance_free_radius,
            max_shipping_distance: None,
        }
    }

    pub fn from_zone(zone: &ShippingZone, defaults: &ShippingDefaults) -> Self {
        Self {
            zone_id: Some(zone.id),
            base_rate: zone.base_rate.unwrap_or(defaults.base_rate).clamp_non_negative(),
            per_km_rate: zone.per_km_rate.unwrap_or(defaults.per_km_rate).clamp_non_negative(),
            free_shipping_threshold: zone.free_shipping_threshold.filter(Money::is_positive),
            distance_free_radius: zone.distance_free_radius.unwrap_or(defaults.distance_free_radius),
            max_shipping_distance: zone.max_shipping_distance,
        }
    }

    /// Settings of the active zone, or the defaults when none is active.
    pub fn resolve(zones: &[ShippingZone], defaults: &ShippingDefaults) -> Self {
        match active_zone(zones) {
            Some(zone) => Self::from_zone(zone, defaults),
            None => Self::from_defaults(defaults),
        }
    }
}

/// First zone flagged active. Extra active zones are ignored with a warning;
/// uniqueness is the admin layer's job, see [`ensure_single_active`].
pub fn active_zone(zones: &[ShippingZone]) -> Option<&ShippingZone> {
    let mut active = zones.iter().filter(|z| z.is_active);
    let first = active.next()?;
    let ignored = active.count();
    if ignored > 0 {
        tracing::warn!(zone = %first.name, ignored, "multiple active shipping zones, using the first");
    }
    Some(first)
}

pub fn ensure_single_active(zones: &[ShippingZone]) -> Result<(), StorefrontError> {
    match zones.iter().filter(|z| z.is_active).count() {
        0 | 1 => Ok(()),
        count => Err(StorefrontError::MultipleActiveZones { count }),
    }
}

/// Zone rates must not be negative; used by admin writes.
pub fn validate_rates(zone: &ShippingZone) -> Result<(), StorefrontError> {
    let money = [("base_rate", zone.base_rate), ("per_km_rate", zone.per_km_rate), ("free_shipping_threshold", zone.free_shipping_threshold)];
    for (field, value) in money {
        if value.is_some_and(|v| v.amount() < Decimal::ZERO) {
            return Err(StorefrontError::InvalidZone(format!("{field} must not be negative")));
        }
    }
    if let (Some(radius), Some(max)) = (zone.distance_free_radius, zone.max_shipping_distance) {
        if max < radius {
            return Err(StorefrontError::InvalidZone("max_shipping_distance is below distance_free_radius".into()));
        }
    }
    Ok(())
}
