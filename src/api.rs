//! HTTP surface: shipping-zone admin, quotes, coupons, checkout and orders.

use std::sync::Arc;
use std::time::Duration;
use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post, put}, Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};
use crate::checkout::{CheckoutError, CheckoutPreview, CheckoutReceipt, CheckoutRequest, CheckoutService, GatewayError, ShippingZoneStore};
use crate::domain::aggregates::coupon::{Coupon, CouponOutcome, DiscountType};
use crate::domain::aggregates::{OrderStatus, ShippingZone};
use crate::domain::services::{OrderTotalAssembler, ShippingCalculator, ShippingQuote};
use crate::domain::value_objects::{Kilometers, Money};
use crate::infrastructure::{EventPublisher, OrderView, PgStore};
use crate::StorefrontError;

pub type PgCheckout = CheckoutService<PgStore, PgStore, PgStore>;

#[derive(Clone)]
pub struct AppState { pub store: PgStore, pub checkout: Arc<PgCheckout>, pub events: EventPublisher }

impl AppState {
    pub fn new(store: PgStore, events: EventPublisher, calculator: ShippingCalculator, assembler: OrderTotalAssembler, order_timeout: Duration) -> Self {
        let checkout = CheckoutService::new(store.clone(), store.clone(), store.clone(), calculator, assembler, order_timeout);
        Self { store, checkout: Arc::new(checkout), events }
    }
}

type ApiError = (StatusCode, String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "furniture-storefront"})) }))
        .route("/api/v1/shipping-zones", get(list_zones).post(create_zone))
        .route("/api/v1/shipping-zones/:id", get(get_zone).put(update_zone).delete(delete_zone))
        .route("/api/v1/shipping/quote", post(quote_shipping))
        .route("/api/v1/coupons", get(list_coupons).post(create_coupon))
        .route("/api/v1/coupons/validate", post(validate_coupon))
        .route("/api/v1/checkout/preview", post(preview_checkout))
        .route("/api/v1/checkout", post(checkout))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/status", put(update_order_status))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

fn store_error(err: StorefrontError) -> ApiError {
    let status = match &err {
        StorefrontError::ZoneNotFound | StorefrontError::OrderNotFound => StatusCode::NOT_FOUND,
        StorefrontError::MultipleActiveZones { .. } | StorefrontError::DuplicateCoupon => StatusCode::CONFLICT,
        StorefrontError::InvalidZone(_) | StorefrontError::Order(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StorefrontError::StorageError(_) => {
            tracing::error!(error = %err, "storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

fn checkout_error(err: CheckoutError) -> ApiError {
    let status = match &err {
        CheckoutError::EmptyCart | CheckoutError::OrderValueTooLarge(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::OrderCreation(GatewayError::Rejected(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        CheckoutError::ZonesUnavailable(_) | CheckoutError::CouponUnavailable(_) | CheckoutError::OrderCreation(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    tracing::warn!(error = %err, "checkout failed");
    (status, err.to_string())
}

fn invalid(errors: ValidationErrors) -> ApiError { (StatusCode::UNPROCESSABLE_ENTITY, errors.to_string()) }

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO { Err(ValidationError::new("negative")) } else { Ok(()) }
}

fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO { Err(ValidationError::new("not_positive")) } else { Ok(()) }
}

// ---- shipping zones ----

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingZoneRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom = "non_negative")]
    pub base_rate: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub per_km_rate: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub free_shipping_threshold: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub distance_free_radius: Option<Decimal>,
    #[validate(custom = "positive")]
    pub max_shipping_distance: Option<Decimal>,
    #[serde(default)]
    pub is_active: bool,
}

impl ShippingZoneRequest {
    fn into_zone(self, id: Uuid) -> ShippingZone {
        ShippingZone {
            id,
            base_rate: self.base_rate.map(Money::new),
            per_km_rate: self.per_km_rate.map(Money::new),
            free_shipping_threshold: self.free_shipping_threshold.map(Money::new),
            distance_free_radius: self.distance_free_radius.map(Kilometers::new),
            max_shipping_distance: self.max_shipping_distance.map(Kilometers::new),
            is_active: self.is_active,
            ..ShippingZone::new(self.name)
        }
    }
}

async fn list_zones(State(s): State<AppState>) -> Result<Json<Vec<ShippingZone>>, ApiError> {
    s.store.list_zones().await.map(Json).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn get_zone(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ShippingZone>, ApiError> {
    s.store.get_zone(id).await.map(Json).map_err(store_error)
}

async fn create_zone(State(s): State<AppState>, Json(r): Json<ShippingZoneRequest>) -> Result<(StatusCode, Json<ShippingZone>), ApiError> {
    r.validate().map_err(invalid)?;
    let zone = s.store.create_zone(&r.into_zone(Uuid::now_v7())).await.map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(zone)))
}

async fn update_zone(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ShippingZoneRequest>) -> Result<Json<ShippingZone>, ApiError> {
    r.validate().map_err(invalid)?;
    s.store.update_zone(&r.into_zone(id)).await.map(Json).map_err(store_error)
}

async fn delete_zone(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    s.store.delete_zone(id).await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- shipping quote ----

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub cart_total: f64,
    #[serde(default)]
    pub distance_km: f64,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub quote: ShippingQuote,
    /// e.g. `₹750`, or `FREE` when nothing is charged.
    pub amount_display: String,
}

async fn quote_shipping(State(s): State<AppState>, Json(r): Json<QuoteRequest>) -> Result<Json<QuoteResponse>, ApiError> {
    let quote = s.checkout.quote_shipping(Money::from_f64(r.cart_total), Kilometers::from_f64(r.distance_km)).await.map_err(checkout_error)?;
    let amount_display = if quote.amount.is_zero() { "FREE".to_string() } else { quote.amount.inr() };
    Ok(Json(QuoteResponse { quote, amount_display }))
}

// ---- coupons ----

#[derive(Debug, Deserialize, Validate)]
pub struct CouponValidationRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[serde(default)]
    pub subtotal: f64,
    pub user_id: Option<Uuid>,
}

async fn validate_coupon(State(s): State<AppState>, Json(r): Json<CouponValidationRequest>) -> Result<Json<CouponOutcome>, ApiError> {
    r.validate().map_err(invalid)?;
    s.checkout.apply_coupon(Some(r.code.as_str()), Money::from_f64(r.subtotal), r.user_id).await.map(Json).map_err(checkout_error)
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "coupon_request_consistent"))]
pub struct CouponRequest {
    #[validate(length(min = 3, max = 32))]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(custom = "positive")]
    pub discount_value: Decimal,
    #[validate(custom = "non_negative")]
    pub minimum_order_amount: Option<Decimal>,
    #[validate(custom = "positive")]
    pub maximum_discount: Option<Decimal>,
    #[validate(range(min = 1))]
    pub usage_limit: Option<i32>,
    #[validate(range(min = 1))]
    pub per_user_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool { true }

fn coupon_request_consistent(r: &CouponRequest) -> Result<(), ValidationError> {
    if r.discount_type == DiscountType::Percentage && r.discount_value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("percentage_over_100"));
    }
    if let (Some(from), Some(until)) = (r.valid_from, r.valid_until) {
        if until <= from { return Err(ValidationError::new("validity_window_empty")); }
    }
    Ok(())
}

async fn list_coupons(State(s): State<AppState>) -> Result<Json<Vec<Coupon>>, ApiError> {
    s.store.list_coupons().await.map(Json).map_err(store_error)
}

async fn create_coupon(State(s): State<AppState>, Json(r): Json<CouponRequest>) -> Result<(StatusCode, Json<Coupon>), ApiError> {
    r.validate().map_err(invalid)?;
    let Some(code) = crate::domain::aggregates::coupon::normalize_code(&r.code) else {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "code: blank".into()));
    };
    let coupon = Coupon {
        id: Uuid::now_v7(), code, description: r.description, discount_type: r.discount_type,
        discount_value: Money::new(r.discount_value), minimum_order_amount: Money::new(r.minimum_order_amount.unwrap_or_default()),
        maximum_discount: r.maximum_discount.map(Money::new), usage_limit: r.usage_limit, usage_count: 0,
        per_user_limit: r.per_user_limit, valid_from: r.valid_from, valid_until: r.valid_until,
        is_active: r.is_active, created_at: Utc::now(),
    };
    let coupon = s.store.create_coupon(&coupon).await.map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

// ---- checkout ----

async fn preview_checkout(State(s): State<AppState>, Json(r): Json<CheckoutRequest>) -> Result<Json<CheckoutPreview>, ApiError> {
    r.validate().map_err(invalid)?;
    s.checkout.preview(&r).await.map(Json).map_err(checkout_error)
}

async fn checkout(State(s): State<AppState>, Json(r): Json<CheckoutRequest>) -> Result<(StatusCode, Json<CheckoutReceipt>), ApiError> {
    r.validate().map_err(invalid)?;
    let receipt = s.checkout.checkout(r).await.map_err(checkout_error)?;
    s.events.publish(&receipt.events).await;
    Ok((StatusCode::CREATED, Json(receipt)))
}

// ---- orders ----

async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<OrderView>, ApiError> {
    s.store.get_order(id).await.map(Json).map_err(store_error)
}

#[derive(Debug, Deserialize)] pub struct StatusRequest { pub status: String }

async fn update_order_status(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<StatusRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let next = OrderStatus::parse(&r.status).ok_or((StatusCode::UNPROCESSABLE_ENTITY, format!("unknown status {}", r.status)))?;
    let event = s.store.update_order_status(id, next).await.map_err(store_error)?;
    s.events.publish(std::slice::from_ref(&event)).await;
    Ok(Json(serde_json::json!({"id": id, "status": next.as_str()})))
}
