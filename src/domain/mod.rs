//! Checkout domain
pub mod value_objects;
pub mod aggregates;
pub mod services;
pub mod events;
