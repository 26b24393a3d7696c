//! Order Aggregate
//!
//! Monetary fields, items and the shipping breakdown are fixed at creation.
//! Only the fulfilment status moves afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::services::totals::PricingSnapshot;
use crate::domain::value_objects::{Money, Sku};

/// Line captured at order time, decoupled from the live product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem { pub product_id: Uuid, pub name: String, pub sku: Sku, pub quantity: u32, pub unit_price: Money, pub total_price: Money }

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(length(min = 10, max = 15))]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub city: String,
    #[validate(length(min = 1, max = 80))]
    pub state: String,
    #[validate(length(equal = 6))]
    pub pincode: String,
    pub country: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Processing => "processing",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled]
            .into_iter()
            .find(|s| s.as_str() == value)
    }

    /// Forward one step at a time; cancellation from anywhere before delivery.
    pub fn transition(self, next: OrderStatus) -> Result<OrderStatus, OrderError> {
        use OrderStatus::*;
        let allowed = matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Processing) | (Processing, Shipped) | (Shipped, Delivered)
                | (Pending | Confirmed | Processing | Shipped, Cancelled)
        );
        if allowed { Ok(next) } else { Err(OrderError::InvalidTransition { from: self, to: next }) }
    }

    /// Checks the move for a stored order and returns the event announcing it.
    pub fn change(self, order_id: Uuid, next: OrderStatus) -> Result<DomainEvent, OrderError> {
        let to = self.transition(next)?;
        Ok(DomainEvent::Order(OrderEvent::StatusChanged { order_id, from: self, to }))
    }
}

/// Payload handed to the order persistence service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Generated once per checkout; resubmitting the same draft never creates a second order.
    pub idempotency_key: Uuid,
    pub user_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub shipping_address: Address,
    pub customer_gst_number: Option<String>,
    pub pricing: PricingSnapshot,
}

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    id: Uuid,
    order_number: String,
    idempotency_key: Uuid,
    user_id: Option<Uuid>,
    status: OrderStatus,
    items: Vec<LineItem>,
    shipping_address: Address,
    customer_gst_number: Option<String>,
    pricing: PricingSnapshot,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Order {
    pub fn place(draft: OrderDraft, order_number: impl Into<String>) -> Result<Self, OrderError> {
        if draft.items.is_empty() { return Err(OrderError::NoItems); }
        let mut order = Self {
            id: Uuid::now_v7(), order_number: order_number.into(), idempotency_key: draft.idempotency_key,
            user_id: draft.user_id, status: OrderStatus::Pending, items: draft.items,
            shipping_address: draft.shipping_address, customer_gst_number: draft.customer_gst_number,
            pricing: draft.pricing, created_at: Utc::now(), events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id,
            order_number: order.order_number.clone(),
            total_amount: order.total_amount(),
            coupon_code: order.pricing.coupon_code().map(str::to_owned),
        }));
        Ok(order)
    }

    /// Human-facing order number, e.g. `FS-261018-004211`.
    pub fn next_number() -> String {
        format!("FS-{}-{:06}", Utc::now().format("%y%m%d"), rand::random::<u32>() % 1_000_000)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn idempotency_key(&self) -> Uuid { self.idempotency_key }
    pub fn user_id(&self) -> Option<Uuid> { self.user_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn shipping_address(&self) -> &Address { &self.shipping_address }
    pub fn customer_gst_number(&self) -> Option<&str> { self.customer_gst_number.as_deref() }
    pub fn pricing(&self) -> &PricingSnapshot { &self.pricing }
    pub fn total_amount(&self) -> Money { self.pricing.totals.total_amount }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems, InvalidTransition { from: OrderStatus, to: OrderStatus } }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "Order has no items"),
            Self::InvalidTransition { from, to } => write!(f, "Cannot move order from {} to {}", from.as_str(), to.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::coupon::CouponOutcome;
    use crate::domain::services::shipping::ShippingCalculator;
    use crate::domain::services::totals::OrderTotalAssembler;
    use crate::domain::value_objects::Kilometers;

    fn draft(items: Vec<LineItem>) -> OrderDraft {
        let subtotal: Money = items.iter().map(|i| i.total_price).sum();
        let quote = ShippingCalculator::default().calculate(subtotal, Kilometers::whole(8), &[]);
        let pricing = OrderTotalAssembler::default().assemble(subtotal, &quote, &CouponOutcome::NotApplied).snapshot;
        OrderDraft { idempotency_key: Uuid::now_v7(), user_id: None, items, shipping_address: Address::default(), customer_gst_number: None, pricing }
    }

    fn bookshelf() -> LineItem {
        LineItem { product_id: Uuid::new_v4(), name: "Sheesham Bookshelf".into(), sku: Sku::new("SHF-SHEESHAM").unwrap(), quantity: 1, unit_price: Money::rupees(14999), total_price: Money::rupees(14999) }
    }

    #[test]
    fn test_place_order() {
        let mut order = Order::place(draft(vec![bookshelf()]), "FS-261018-000001").unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_amount(), Money::rupees(15149));
        let events = order.take_events();
        assert!(matches!(events.as_slice(), [DomainEvent::Order(OrderEvent::Placed { .. })]));
        assert!(order.take_events().is_empty());
    }

    #[test]
    fn test_status_change_event() {
        let id = Uuid::now_v7();
        let event = OrderStatus::Processing.change(id, OrderStatus::Shipped).unwrap();
        assert_eq!(event, DomainEvent::Order(OrderEvent::StatusChanged { order_id: id, from: OrderStatus::Processing, to: OrderStatus::Shipped }));
        assert_eq!(event.subject(), "order.status_changed");
    }

    #[test]
    fn test_empty_order_rejected() {
        assert_eq!(Order::place(draft(vec![]), "FS-1").unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn test_delivered_order_cannot_cancel() {
        let mut status = OrderStatus::Pending;
        for next in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
            status = status.transition(next).unwrap();
        }
        let id = Uuid::now_v7();
        assert_eq!(
            status.change(id, OrderStatus::Cancelled),
            Err(OrderError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Cancelled })
        );
        assert!(OrderStatus::Shipped.change(id, OrderStatus::Cancelled).is_ok());
    }

    #[test]
    fn test_status_cannot_skip_steps() {
        assert!(OrderStatus::Pending.transition(OrderStatus::Shipped).is_err());
        assert_eq!(OrderStatus::parse("processing"), Some(OrderStatus::Processing));
        assert_eq!(OrderStatus::parse("lost"), None);
    }

    #[test]
    fn test_next_number_shape() {
        let number = Order::next_number();
        assert!(number.starts_with("FS-"));
        assert_eq!(number.len(), "FS-261018-004211".len());
    }
}
