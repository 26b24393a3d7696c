//! Checkout orchestration
//!
//! Loads zones, prices shipping, asks the coupon service, assembles totals
//! and hands the draft to the order service. Calls are awaited one after
//! another; only order creation is retried.

use std::future::Future;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};
use crate::domain::aggregates::coupon::{normalize_code, CouponOutcome, CouponValidation};
use crate::domain::aggregates::{Address, Cart, CartItem, OrderDraft, ShippingZone};
use crate::domain::events::DomainEvent;
use crate::domain::services::{AssembledOrder, OrderTotalAssembler, ShippingBreakdown, ShippingCalculator, ShippingQuote, OrderTotals};
use crate::domain::value_objects::{Kilometers, Money};

/// Order creation is attempted at most this many times per checkout.
pub const ORDER_CREATE_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("rejected: {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool { matches!(self, Self::Timeout | Self::Unavailable(_)) }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Order value {0} exceeds the maximum order value")]
    OrderValueTooLarge(Money),
    #[error("Shipping zones unavailable: {0}")]
    ZonesUnavailable(#[source] GatewayError),
    #[error("Coupon could not be validated: {0}")]
    CouponUnavailable(#[source] GatewayError),
    #[error("Order could not be placed: {0}")]
    OrderCreation(#[source] GatewayError),
}

pub trait ShippingZoneStore {
    fn list_zones(&self) -> impl Future<Output = Result<Vec<ShippingZone>, GatewayError>> + Send;
}

pub trait CouponValidator {
    fn validate_coupon(&self, code: &str, subtotal: Money, user_id: Option<Uuid>) -> impl Future<Output = Result<CouponValidation, GatewayError>> + Send;
}

#[derive(Clone, Debug)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub order_number: String,
    /// True when the idempotency key matched an order created earlier.
    pub replayed: bool,
    pub events: Vec<DomainEvent>,
}

pub trait OrderGateway {
    fn create_order(&self, draft: &OrderDraft) -> impl Future<Output = Result<PlacedOrder, GatewayError>> + Send;
}

impl<T: ShippingZoneStore + Sync> ShippingZoneStore for &T {
    fn list_zones(&self) -> impl Future<Output = Result<Vec<ShippingZone>, GatewayError>> + Send { (**self).list_zones() }
}

impl<T: CouponValidator + Sync> CouponValidator for &T {
    fn validate_coupon(&self, code: &str, subtotal: Money, user_id: Option<Uuid>) -> impl Future<Output = Result<CouponValidation, GatewayError>> + Send {
        (**self).validate_coupon(code, subtotal, user_id)
    }
}

impl<T: OrderGateway + Sync> OrderGateway for &T {
    fn create_order(&self, draft: &OrderDraft) -> impl Future<Output = Result<PlacedOrder, GatewayError>> + Send { (**self).create_order(draft) }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub items: Vec<CartItem>,
    /// Raw distance from the storefront; NaN and negatives count as zero.
    #[serde(default)]
    pub distance_km: f64,
    #[validate(length(max = 32))]
    pub coupon_code: Option<String>,
    #[validate]
    pub shipping_address: Address,
    #[validate(custom = "gstin")]
    pub customer_gst_number: Option<String>,
}

/// GSTIN: 15 alphanumeric characters.
fn gstin(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || (value.len() == 15 && value.chars().all(|c| c.is_ascii_alphanumeric())) {
        Ok(())
    } else {
        Err(ValidationError::new("gstin"))
    }
}

/// Priced but not yet placed.
#[derive(Clone, Debug, Serialize)]
pub struct CheckoutPreview {
    pub shipping: ShippingQuote,
    pub coupon: CouponOutcome,
    pub assembled: AssembledOrder,
}

#[derive(Clone, Debug, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub order_number: String,
    pub totals: OrderTotals,
    pub shipping_breakdown: ShippingBreakdown,
    pub coupon: CouponOutcome,
    #[serde(skip)]
    pub events: Vec<DomainEvent>,
}

#[derive(Clone, Debug)]
pub struct CheckoutService<Z, C, O> {
    zones: Z,
    coupons: C,
    orders: O,
    calculator: ShippingCalculator,
    assembler: OrderTotalAssembler,
    order_timeout: Duration,
}

impl<Z, C, O> CheckoutService<Z, C, O>
where
    Z: ShippingZoneStore + Sync,
    C: CouponValidator + Sync,
    O: OrderGateway + Sync,
{
    pub fn new(zones: Z, coupons: C, orders: O, calculator: ShippingCalculator, assembler: OrderTotalAssembler, order_timeout: Duration) -> Self {
        Self { zones, coupons, orders, calculator, assembler, order_timeout }
    }

    pub async fn quote_shipping(&self, cart_total: Money, distance: Kilometers) -> Result<ShippingQuote, CheckoutError> {
        let zones = self.zones.list_zones().await.map_err(CheckoutError::ZonesUnavailable)?;
        Ok(self.calculator.calculate(cart_total, distance, &zones))
    }

    pub async fn apply_coupon(&self, code: Option<&str>, subtotal: Money, user_id: Option<Uuid>) -> Result<CouponOutcome, CheckoutError> {
        let Some(code) = code.and_then(normalize_code) else { return Ok(CouponOutcome::NotApplied) };
        let validation = self.coupons.validate_coupon(&code, subtotal, user_id).await.map_err(CheckoutError::CouponUnavailable)?;
        if !validation.valid {
            info!(%code, message = %validation.message, "coupon rejected");
        }
        Ok(CouponOutcome::from_validation(code, validation, subtotal))
    }

    pub async fn preview(&self, request: &CheckoutRequest) -> Result<CheckoutPreview, CheckoutError> {
        let cart = Cart::from_items(request.items.iter().cloned());
        self.price(&cart, request).await
    }

    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, CheckoutError> {
        let cart = Cart::from_items(request.items.iter().cloned());
        let preview = self.price(&cart, &request).await?;

        let draft = OrderDraft {
            idempotency_key: Uuid::now_v7(),
            user_id: request.user_id,
            items: cart.line_items(),
            shipping_address: request.shipping_address,
            customer_gst_number: request.customer_gst_number.map(|g| g.trim().to_uppercase()).filter(|g| !g.is_empty()),
            pricing: preview.assembled.snapshot,
        };
        let placed = self.create_order(&draft).await?;
        info!(order_id = %placed.order_id, order_number = %placed.order_number, total = %draft.pricing.totals.total_amount, replayed = placed.replayed, "order placed");

        Ok(CheckoutReceipt {
            order_id: placed.order_id,
            order_number: placed.order_number,
            totals: draft.pricing.totals,
            shipping_breakdown: draft.pricing.shipping_breakdown,
            coupon: draft.pricing.coupon,
            events: placed.events,
        })
    }

    async fn price(&self, cart: &Cart, request: &CheckoutRequest) -> Result<CheckoutPreview, CheckoutError> {
        if cart.is_empty() { return Err(CheckoutError::EmptyCart); }
        let subtotal = cart.subtotal();
        let shipping = self.quote_shipping(subtotal, Kilometers::from_f64(request.distance_km)).await?;
        let gross = subtotal + shipping.amount;
        if gross.exceeds_order_limit() { return Err(CheckoutError::OrderValueTooLarge(gross)); }
        let coupon = self.apply_coupon(request.coupon_code.as_deref(), subtotal, request.user_id).await?;
        let assembled = self.assembler.assemble(subtotal, &shipping, &coupon);
        Ok(CheckoutPreview { shipping, coupon, assembled })
    }

    /// Timeouts and transport failures get one more attempt with the same draft;
    /// the idempotency key keeps that from creating a duplicate order.
    async fn create_order(&self, draft: &OrderDraft) -> Result<PlacedOrder, CheckoutError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.order_timeout, self.orders.create_order(draft)).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout),
            };
            match result {
                Ok(placed) => return Ok(placed),
                Err(err) if err.is_retryable() && attempt < ORDER_CREATE_ATTEMPTS => {
                    warn!(attempt, key = %draft.idempotency_key, error = %err, "order creation failed, retrying");
                }
                Err(err) => return Err(CheckoutError::OrderCreation(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use rust_decimal::Decimal;
    use crate::domain::value_objects::Sku;

    #[derive(Default)]
    struct FakeBackend {
        zones: Vec<ShippingZone>,
        coupon: Option<CouponValidation>,
        coupon_down: bool,
        /// Errors returned by the first create calls, in order.
        create_failures: Mutex<Vec<GatewayError>>,
        stall_first_create: bool,
        drafts: Mutex<Vec<OrderDraft>>,
        coupon_calls: Mutex<Vec<(String, Money)>>,
    }

    impl ShippingZoneStore for FakeBackend {
        async fn list_zones(&self) -> Result<Vec<ShippingZone>, GatewayError> { Ok(self.zones.clone()) }
    }

    impl CouponValidator for FakeBackend {
        async fn validate_coupon(&self, code: &str, subtotal: Money, _user_id: Option<Uuid>) -> Result<CouponValidation, GatewayError> {
            self.coupon_calls.lock().unwrap().push((code.to_string(), subtotal));
            if self.coupon_down { return Err(GatewayError::Unavailable("connection refused".into())); }
            Ok(self.coupon.clone().unwrap_or(CouponValidation { valid: false, discount_amount: Money::ZERO, message: "Invalid coupon code".into() }))
        }
    }

    impl OrderGateway for FakeBackend {
        async fn create_order(&self, draft: &OrderDraft) -> Result<PlacedOrder, GatewayError> {
            let attempt = {
                let mut drafts = self.drafts.lock().unwrap();
                drafts.push(draft.clone());
                drafts.len()
            };
            if self.stall_first_create && attempt == 1 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            let failure = {
                let mut failures = self.create_failures.lock().unwrap();
                (!failures.is_empty()).then(|| failures.remove(0))
            };
            if let Some(err) = failure { return Err(err); }
            Ok(PlacedOrder { order_id: Uuid::now_v7(), order_number: "FS-261018-000042".into(), replayed: false, events: vec![] })
        }
    }

    fn service(backend: &FakeBackend) -> CheckoutService<&FakeBackend, &FakeBackend, &FakeBackend> {
        CheckoutService::new(backend, backend, backend, ShippingCalculator::default(), OrderTotalAssembler::default(), Duration::from_millis(100))
    }

    fn request(unit_price: i64, quantity: u32, km: f64, coupon: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            user_id: Some(Uuid::new_v4()),
            items: vec![CartItem { product_id: Uuid::new_v4(), name: "Recliner".into(), sku: Sku::new("RCL-01").unwrap(), quantity, unit_price: Money::rupees(unit_price) }],
            distance_km: km,
            coupon_code: coupon.map(str::to_owned),
            shipping_address: Address::default(),
            customer_gst_number: None,
        }
    }

    #[tokio::test]
    async fn test_checkout_without_coupon() {
        let backend = FakeBackend::default();
        let receipt = service(&backend).checkout(request(2500, 2, 10.0, None)).await.unwrap();
        assert_eq!(receipt.totals.subtotal, Money::rupees(5000));
        assert_eq!(receipt.totals.shipping_amount, Money::rupees(750));
        assert_eq!(receipt.totals.total_amount, Money::rupees(5750));
        assert_eq!(receipt.coupon, CouponOutcome::NotApplied);
        assert!(backend.coupon_calls.lock().unwrap().is_empty());
        assert_eq!(backend.drafts.lock().unwrap()[0].items.len(), 1);
    }

    #[tokio::test]
    async fn test_valid_coupon_reduces_total() {
        let backend = FakeBackend {
            coupon: Some(CouponValidation { valid: true, discount_amount: Money::rupees(1200), message: "Coupon applied successfully".into() }),
            ..Default::default()
        };
        let receipt = service(&backend).checkout(request(6000, 2, 3.0, Some(" welcome10 "))).await.unwrap();
        assert_eq!(receipt.totals.discount_amount, Money::rupees(1200));
        assert_eq!(receipt.totals.total_amount, Money::rupees(10800));
        assert_eq!(backend.coupon_calls.lock().unwrap()[0], ("WELCOME10".to_string(), Money::rupees(12000)));
        assert_eq!(backend.drafts.lock().unwrap()[0].pricing.coupon_code(), Some("WELCOME10"));
    }

    #[tokio::test]
    async fn test_invalid_coupon_does_not_block_checkout() {
        let backend = FakeBackend::default();
        let receipt = service(&backend).checkout(request(5000, 1, 3.0, Some("EXPIRED"))).await.unwrap();
        assert_eq!(receipt.totals.discount_amount, Money::ZERO);
        assert_eq!(receipt.totals.total_amount, Money::rupees(5500));
        assert_eq!(receipt.coupon.message(), Some("Invalid coupon code"));
    }

    #[tokio::test]
    async fn test_coupon_service_down_fails_checkout() {
        let backend = FakeBackend { coupon_down: true, ..Default::default() };
        let err = service(&backend).checkout(request(5000, 1, 3.0, Some("WELCOME10"))).await.unwrap_err();
        assert!(matches!(err, CheckoutError::CouponUnavailable(_)));
        assert!(backend.drafts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let backend = FakeBackend::default();
        let err = service(&backend).checkout(request(5000, 0, 3.0, None)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_transport_failure_retried_once_with_same_key() {
        let backend = FakeBackend { create_failures: Mutex::new(vec![GatewayError::Unavailable("reset".into())]), ..Default::default() };
        service(&backend).checkout(request(5000, 1, 3.0, None)).await.unwrap();
        let drafts = backend.drafts.lock().unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].idempotency_key, drafts[1].idempotency_key);
    }

    #[tokio::test]
    async fn test_timeout_retried_once() {
        let backend = FakeBackend { stall_first_create: true, ..Default::default() };
        service(&backend).checkout(request(5000, 1, 3.0, None)).await.unwrap();
        assert_eq!(backend.drafts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_second_failure() {
        let backend = FakeBackend {
            create_failures: Mutex::new(vec![GatewayError::Timeout, GatewayError::Unavailable("down".into())]),
            ..Default::default()
        };
        let err = service(&backend).checkout(request(5000, 1, 3.0, None)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::OrderCreation(GatewayError::Unavailable(_))));
        assert_eq!(backend.drafts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejection_not_retried() {
        let backend = FakeBackend { create_failures: Mutex::new(vec![GatewayError::Rejected("constraint".into())]), ..Default::default() };
        let err = service(&backend).checkout(request(5000, 1, 3.0, None)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::OrderCreation(GatewayError::Rejected(_))));
        assert_eq!(backend.drafts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_order_rejected_before_placement() {
        let backend = FakeBackend::default();
        let mut huge = request(0, 100, 3.0, Some("WELCOME10"));
        huge.items[0].unit_price = Money::new(Decimal::from_i128_with_scale(10_i128.pow(27), 0));
        let err = service(&backend).checkout(huge).await.unwrap_err();
        assert!(matches!(err, CheckoutError::OrderValueTooLarge(_)));
        assert!(backend.coupon_calls.lock().unwrap().is_empty());
        assert!(backend.drafts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_far_distance_is_priced_not_panicking() {
        let backend = FakeBackend::default();
        let receipt = service(&backend).checkout(request(5000, 1, 1e28, None)).await.unwrap();
        assert_eq!(receipt.shipping_breakdown.distance_km, Kilometers::MAX);
        assert_eq!(receipt.totals.shipping_amount, Money::rupees(500 + 50 * 99_995));
    }

    #[test]
    fn test_gstin_format() {
        assert!(gstin("29ABCDE1234F1Z5").is_ok());
        assert!(gstin("").is_ok());
        assert!(gstin("29ABCDE").is_err());
    }

    #[tokio::test]
    async fn test_preview_uses_active_zone() {
        let zone = ShippingZone {
            is_active: true,
            base_rate: Some(Money::rupees(500)),
            per_km_rate: Some(Money::rupees(50)),
            free_shipping_threshold: Some(Money::rupees(10_000)),
            distance_free_radius: Some(Kilometers::whole(5)),
            max_shipping_distance: Some(Kilometers::whole(7)),
            ..ShippingZone::new("Hyderabad")
        };
        let backend = FakeBackend { zones: vec![zone], ..Default::default() };
        let preview = service(&backend).preview(&request(5000, 1, 10.0, None)).await.unwrap();
        assert_eq!(preview.shipping.amount, Money::rupees(600));
        assert_eq!(preview.assembled.total_amount, Money::rupees(5600));
        assert!(backend.drafts.lock().unwrap().is_empty());
    }
}
