//! Adapters for the checkout ports
pub mod events;
pub mod postgres;

pub use events::EventPublisher;
pub use postgres::{OrderView, PgStore};
