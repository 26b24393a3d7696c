//! Cart Aggregate

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::order::LineItem;
use crate::domain::value_objects::{Money, Sku};

/// Cart contents handed to checkout. Persisting the cart is the storefront's concern.
#[derive(Clone, Debug, Default)]
pub struct Cart {
    items: Vec<CartItem>,
    subtotal: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub sku: Sku,
    pub quantity: u32,
    /// GST-inclusive price per unit.
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.unit_price.clamp_non_negative().multiply(self.quantity) }

    /// Freezes the item as an order line so later catalogue edits do not touch the order.
    pub fn to_line_item(&self) -> LineItem {
        LineItem {
            product_id: self.product_id, name: self.name.clone(), sku: self.sku.clone(),
            quantity: self.quantity, unit_price: self.unit_price.clamp_non_negative(), total_price: self.line_total(),
        }
    }
}

impl Cart {
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::default();
        for item in items { cart.add_item(item); }
        cart
    }

    pub fn subtotal(&self) -> Money { self.subtotal }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Merges into an existing line for the same product; zero quantities are dropped.
    fn add_item(&mut self, item: CartItem) {
        if item.quantity == 0 { return; }
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
        self.recalculate();
    }

    pub fn line_items(&self) -> Vec<LineItem> { self.items.iter().map(CartItem::to_line_item).collect() }

    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().map(CartItem::line_total).sum();
    }
}
