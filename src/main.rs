//! Furniture storefront checkout service

use anyhow::Result;
use furniture_storefront::api::{self, AppState};
use furniture_storefront::config::AppConfig;
use furniture_storefront::infrastructure::{EventPublisher, PgStore};
use furniture_storefront::{OrderTotalAssembler, ShippingCalculator};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = AppConfig::from_env()?;
    let db = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let events = EventPublisher::connect(config.nats_url.as_deref()).await;

    let state = AppState::new(
        PgStore::new(db),
        events,
        ShippingCalculator::new(config.shipping_defaults),
        OrderTotalAssembler::new(config.gst_rate_percent),
        config.order_create_timeout,
    );
    let app = api::router(state);

    tracing::info!(port = config.port, gst_rate = %config.gst_rate_percent, "furniture storefront listening");
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
