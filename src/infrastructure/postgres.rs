//! Postgres-backed zone store, coupon validation and order persistence.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use crate::checkout::{CouponValidator, GatewayError, OrderGateway, PlacedOrder, ShippingZoneStore};
use crate::domain::aggregates::coupon::{Coupon, CouponValidation, DiscountType};
use crate::domain::aggregates::shipping_zone::{ensure_single_active, validate_rates};
use crate::domain::aggregates::{Order, OrderDraft, OrderStatus, ShippingZone};
use crate::domain::events::DomainEvent;
use crate::domain::services::ShippingBreakdown;
use crate::domain::value_objects::{Kilometers, Money};
use crate::{Result, StorefrontError};

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                GatewayError::Unavailable(err.to_string())
            }
            _ => GatewayError::Rejected(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for StorefrontError {
    fn from(err: sqlx::Error) -> Self { StorefrontError::StorageError(err.to_string()) }
}

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

const ZONE_COLUMNS: &str = "id, name, base_rate, per_km_rate, free_shipping_threshold, distance_free_radius, max_shipping_distance, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ShippingZoneRow {
    id: Uuid, name: String, base_rate: Option<Decimal>, per_km_rate: Option<Decimal>,
    free_shipping_threshold: Option<Decimal>, distance_free_radius: Option<Decimal>, max_shipping_distance: Option<Decimal>,
    is_active: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<ShippingZoneRow> for ShippingZone {
    fn from(r: ShippingZoneRow) -> Self {
        ShippingZone {
            id: r.id, name: r.name,
            base_rate: r.base_rate.map(Money::new),
            per_km_rate: r.per_km_rate.map(Money::new),
            free_shipping_threshold: r.free_shipping_threshold.map(Money::new),
            distance_free_radius: r.distance_free_radius.map(Kilometers::new),
            max_shipping_distance: r.max_shipping_distance.map(Kilometers::new),
            is_active: r.is_active, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid, code: String, description: Option<String>, discount_type: String, discount_value: Decimal,
    minimum_order_amount: Decimal, maximum_discount: Option<Decimal>, usage_limit: Option<i32>, usage_count: i32,
    per_user_limit: Option<i32>, valid_from: Option<DateTime<Utc>>, valid_until: Option<DateTime<Utc>>,
    is_active: bool, created_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = StorefrontError;
    fn try_from(r: CouponRow) -> Result<Self> {
        let discount_type = DiscountType::parse(&r.discount_type)
            .ok_or_else(|| StorefrontError::StorageError(format!("unknown discount type {}", r.discount_type)))?;
        Ok(Coupon {
            id: r.id, code: r.code, description: r.description, discount_type,
            discount_value: Money::new(r.discount_value), minimum_order_amount: Money::new(r.minimum_order_amount),
            maximum_discount: r.maximum_discount.map(Money::new), usage_limit: r.usage_limit, usage_count: r.usage_count,
            per_user_limit: r.per_user_limit, valid_from: r.valid_from, valid_until: r.valid_until,
            is_active: r.is_active, created_at: r.created_at,
        })
    }
}

/// Stored order as shown on receipts and in the back-office.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub status: String,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub coupon_code: Option<String>,
    pub customer_gst_number: Option<String>,
    pub shipping_address: Json<serde_json::Value>,
    pub shipping_breakdown: Json<ShippingBreakdown>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderItemView { pub product_id: Uuid, pub name: String, pub sku: String, pub quantity: i32, pub unit_price: Decimal, pub total_price: Decimal }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    // ---- shipping zones (admin) ----

    pub async fn get_zone(&self, id: Uuid) -> Result<ShippingZone> {
        sqlx::query_as::<_, ShippingZoneRow>(&format!("SELECT {ZONE_COLUMNS} FROM shipping_zones WHERE id = $1"))
            .bind(id).fetch_optional(&self.pool).await?
            .map(ShippingZone::from).ok_or(StorefrontError::ZoneNotFound)
    }

    /// Inserts the zone; activating it deactivates every other zone.
    pub async fn create_zone(&self, zone: &ShippingZone) -> Result<ShippingZone> {
        validate_rates(zone)?;
        let mut tx = self.pool.begin().await?;
        if zone.is_active { deactivate_others(&mut tx, zone.id).await?; }
        let row = sqlx::query_as::<_, ShippingZoneRow>(&format!(
            "INSERT INTO shipping_zones ({ZONE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) RETURNING {ZONE_COLUMNS}"))
            .bind(zone.id).bind(&zone.name).bind(zone.base_rate.map(|m| m.amount())).bind(zone.per_km_rate.map(|m| m.amount()))
            .bind(zone.free_shipping_threshold.map(|m| m.amount())).bind(zone.distance_free_radius.map(|k| k.value()))
            .bind(zone.max_shipping_distance.map(|k| k.value())).bind(zone.is_active)
            .fetch_one(&mut *tx).await?;
        check_single_active(&mut tx).await?;
        tx.commit().await?;
        tracing::info!(zone = %row.name, active = row.is_active, "shipping zone created");
        Ok(row.into())
    }

    pub async fn update_zone(&self, zone: &ShippingZone) -> Result<ShippingZone> {
        validate_rates(zone)?;
        let mut tx = self.pool.begin().await?;
        if zone.is_active { deactivate_others(&mut tx, zone.id).await?; }
        let row = sqlx::query_as::<_, ShippingZoneRow>(&format!(
            "UPDATE shipping_zones SET name = $2, base_rate = $3, per_km_rate = $4, free_shipping_threshold = $5, distance_free_radius = $6, max_shipping_distance = $7, is_active = $8, updated_at = NOW() WHERE id = $1 RETURNING {ZONE_COLUMNS}"))
            .bind(zone.id).bind(&zone.name).bind(zone.base_rate.map(|m| m.amount())).bind(zone.per_km_rate.map(|m| m.amount()))
            .bind(zone.free_shipping_threshold.map(|m| m.amount())).bind(zone.distance_free_radius.map(|k| k.value()))
            .bind(zone.max_shipping_distance.map(|k| k.value())).bind(zone.is_active)
            .fetch_optional(&mut *tx).await?
            .ok_or(StorefrontError::ZoneNotFound)?;
        check_single_active(&mut tx).await?;
        tx.commit().await?;
        tracing::info!(zone = %row.name, active = row.is_active, "shipping zone updated");
        Ok(row.into())
    }

    pub async fn delete_zone(&self, id: Uuid) -> Result<()> {
        let done = sqlx::query("DELETE FROM shipping_zones WHERE id = $1").bind(id).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StorefrontError::ZoneNotFound); }
        Ok(())
    }

    // ---- coupons (admin) ----

    pub async fn list_coupons(&self) -> Result<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons ORDER BY created_at DESC").fetch_all(&self.pool).await?;
        rows.into_iter().map(Coupon::try_from).collect()
    }

    pub async fn create_coupon(&self, coupon: &Coupon) -> Result<Coupon> {
        let row = sqlx::query_as::<_, CouponRow>("INSERT INTO coupons (id, code, description, discount_type, discount_value, minimum_order_amount, maximum_discount, usage_limit, usage_count, per_user_limit, valid_from, valid_until, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11, $12, NOW()) RETURNING *")
            .bind(coupon.id).bind(&coupon.code).bind(&coupon.description).bind(coupon.discount_type.as_str())
            .bind(coupon.discount_value.amount()).bind(coupon.minimum_order_amount.amount()).bind(coupon.maximum_discount.map(|m| m.amount()))
            .bind(coupon.usage_limit).bind(coupon.per_user_limit).bind(coupon.valid_from).bind(coupon.valid_until).bind(coupon.is_active)
            .fetch_one(&self.pool).await
            .map_err(|e| {
                let duplicate = e.as_database_error().is_some_and(|db| db.is_unique_violation());
                if duplicate { StorefrontError::DuplicateCoupon } else { e.into() }
            })?;
        row.try_into()
    }

    // ---- orders ----

    pub async fn get_order(&self, id: Uuid) -> Result<OrderView> {
        let mut order = sqlx::query_as::<_, OrderView>("SELECT id, order_number, user_id, status, subtotal, tax_amount, shipping_amount, discount_amount, total_amount, coupon_code, customer_gst_number, shipping_address, shipping_breakdown, created_at FROM orders WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?.ok_or(StorefrontError::OrderNotFound)?;
        order.items = sqlx::query_as::<_, OrderItemView>("SELECT product_id, name, sku, quantity, unit_price, total_price FROM order_items WHERE order_id = $1 ORDER BY position")
            .bind(id).fetch_all(&self.pool).await?;
        Ok(order)
    }

    /// Moves an order along its lifecycle; prices are never touched.
    pub async fn update_order_status(&self, id: Uuid, next: OrderStatus) -> Result<DomainEvent> {
        let mut tx = self.pool.begin().await?;
        let (current,): (String,) = sqlx::query_as("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id).fetch_optional(&mut *tx).await?.ok_or(StorefrontError::OrderNotFound)?;
        let from = OrderStatus::parse(&current).ok_or_else(|| StorefrontError::StorageError(format!("unknown order status {current}")))?;
        let event = from.change(id, next)?;
        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1").bind(id).bind(next.as_str()).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn find_by_idempotency_key(&self, key: Uuid) -> std::result::Result<Option<(Uuid, String)>, GatewayError> {
        Ok(sqlx::query_as("SELECT id, order_number FROM orders WHERE idempotency_key = $1").bind(key).fetch_optional(&self.pool).await?)
    }
}

async fn deactivate_others(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE shipping_zones SET is_active = FALSE, updated_at = NOW() WHERE is_active AND id <> $1").bind(id).execute(&mut **tx).await?;
    Ok(())
}

async fn check_single_active(tx: &mut Transaction<'_, Postgres>) -> Result<()> {
    let active = sqlx::query_as::<_, ShippingZoneRow>(&format!("SELECT {ZONE_COLUMNS} FROM shipping_zones WHERE is_active"))
        .fetch_all(&mut **tx).await?;
    ensure_single_active(&active.into_iter().map(ShippingZone::from).collect::<Vec<_>>())
}

impl ShippingZoneStore for PgStore {
    async fn list_zones(&self) -> std::result::Result<Vec<ShippingZone>, GatewayError> {
        let rows = sqlx::query_as::<_, ShippingZoneRow>(&format!("SELECT {ZONE_COLUMNS} FROM shipping_zones ORDER BY created_at"))
            .fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ShippingZone::from).collect())
    }
}

impl CouponValidator for PgStore {
    async fn validate_coupon(&self, code: &str, subtotal: Money, user_id: Option<Uuid>) -> std::result::Result<CouponValidation, GatewayError> {
        let (valid, discount_amount, message): (bool, Decimal, String) =
            sqlx::query_as("SELECT valid, discount_amount, message FROM validate_coupon($1, $2, $3)")
                .bind(code).bind(subtotal.amount()).bind(user_id)
                .fetch_one(&self.pool).await?;
        Ok(CouponValidation { valid, discount_amount: Money::new(discount_amount), message })
    }
}

impl OrderGateway for PgStore {
    async fn create_order(&self, draft: &OrderDraft) -> std::result::Result<PlacedOrder, GatewayError> {
        if let Some((order_id, order_number)) = self.find_by_idempotency_key(draft.idempotency_key).await? {
            return Ok(PlacedOrder { order_id, order_number, replayed: true, events: vec![] });
        }

        let mut order = Order::place(draft.clone(), Order::next_number()).map_err(|e| GatewayError::Rejected(e.to_string()))?;
        let totals = order.pricing().totals;
        let mut tx = self.pool.begin().await?;

        let inserted: Option<(Uuid,)> = sqlx::query_as("INSERT INTO orders (id, order_number, idempotency_key, user_id, status, subtotal, tax_amount, shipping_amount, discount_amount, total_amount, coupon_code, shipping_address, shipping_breakdown, customer_gst_number, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW(), NOW()) ON CONFLICT (idempotency_key) DO NOTHING RETURNING id")
            .bind(order.id()).bind(order.order_number()).bind(order.idempotency_key()).bind(order.user_id()).bind(order.status().as_str())
            .bind(totals.subtotal.amount()).bind(totals.tax_amount.amount()).bind(totals.shipping_amount.amount())
            .bind(totals.discount_amount.amount()).bind(totals.total_amount.amount()).bind(order.pricing().coupon_code())
            .bind(Json(order.shipping_address())).bind(Json(&order.pricing().shipping_breakdown)).bind(order.customer_gst_number())
            .fetch_optional(&mut *tx).await?;

        if inserted.is_none() {
            // A concurrent attempt with the same key won the insert.
            tx.rollback().await?;
            let (order_id, order_number) = self.find_by_idempotency_key(draft.idempotency_key).await?
                .ok_or_else(|| GatewayError::Rejected("order vanished after idempotency conflict".into()))?;
            return Ok(PlacedOrder { order_id, order_number, replayed: true, events: vec![] });
        }

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query("INSERT INTO order_items (id, order_id, position, product_id, name, sku, quantity, unit_price, total_price) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
                .bind(Uuid::now_v7()).bind(order.id()).bind(position as i32).bind(item.product_id).bind(&item.name).bind(item.sku.as_str())
                .bind(item.quantity as i32).bind(item.unit_price.amount()).bind(item.total_price.amount())
                .execute(&mut *tx).await?;
        }

        if let Some(code) = order.pricing().coupon_code() {
            sqlx::query("INSERT INTO coupon_usages (id, coupon_id, user_id, order_id, used_at) SELECT $1, id, $3, $4, NOW() FROM coupons WHERE code = $2")
                .bind(Uuid::now_v7()).bind(code).bind(order.user_id()).bind(order.id())
                .execute(&mut *tx).await?;
            sqlx::query("UPDATE coupons SET usage_count = usage_count + 1 WHERE code = $1").bind(code).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(PlacedOrder {
            order_id: order.id(),
            order_number: order.order_number().to_string(),
            replayed: false,
            events: order.take_events(),
        })
    }
}
