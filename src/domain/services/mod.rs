//! Pricing services: pure functions over aggregates
pub mod shipping;
pub mod totals;

pub use shipping::{ShippingBreakdown, ShippingCalculator, ShippingQuote};
pub use totals::{AssembledOrder, OrderTotalAssembler, OrderTotals, PricingSnapshot};
