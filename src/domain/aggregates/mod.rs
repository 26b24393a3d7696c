//! Aggregates module
pub mod shipping_zone;
pub mod coupon;
pub mod order;
pub mod cart;

pub use shipping_zone::{ShippingDefaults, ShippingSettings, ShippingZone};
pub use coupon::{Coupon, CouponOutcome, CouponValidation, DiscountType};
pub use order::{Address, LineItem, Order, OrderDraft, OrderError, OrderStatus};
pub use cart::{Cart, CartItem};
