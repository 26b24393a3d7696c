//! Furniture Storefront Checkout
//!
//! Order pricing for a furniture storefront: admin-maintained shipping
//! zones, distance-based delivery charges, coupon discounts from the
//! coupon service, and GST-inclusive order totals frozen onto each order.
//!
//! ## Layout
//! - [`domain`] - value objects, aggregates and the pure pricing services
//! - [`checkout`] - checkout orchestration over async collaborator ports
//! - [`infrastructure`] - Postgres and NATS adapters for those ports
//! - [`api`] - HTTP surface
//! - [`config`] - environment configuration

use thiserror::Error;

pub mod api;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use checkout::{CheckoutError, CheckoutRequest, CheckoutService, GatewayError};
pub use domain::aggregates::{ShippingDefaults, ShippingZone};
pub use domain::services::{OrderTotalAssembler, ShippingCalculator, ShippingQuote};
pub use domain::value_objects::{Kilometers, Money};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Shipping zone not found")]
    ZoneNotFound,

    #[error("{count} shipping zones are active; only one may be")]
    MultipleActiveZones { count: usize },

    #[error("Invalid shipping zone: {0}")]
    InvalidZone(String),

    #[error("Coupon code already exists")]
    DuplicateCoupon,

    #[error("Order not found")]
    OrderNotFound,

    #[error(transparent)]
    Order(#[from] domain::aggregates::OrderError),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
