//! Domain event publishing over NATS. Optional: without `NATS_URL` events are dropped.

use tracing::{info, warn};
use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher { nats: Option<async_nats::Client> }

impl EventPublisher {
    pub fn disabled() -> Self { Self::default() }

    /// Connects when a URL is given; a failed connection disables publishing.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => {
                info!(%url, "connected to NATS");
                Self { nats: Some(client) }
            }
            Err(err) => {
                warn!(%url, error = %err, "NATS unavailable, events will not be published");
                Self::disabled()
            }
        }
    }

    /// Never fails the caller; publish errors are logged.
    pub async fn publish(&self, events: &[DomainEvent]) {
        let Some(client) = &self.nats else { return };
        for event in events {
            let payload = match serde_json::to_vec(event) {
                Ok(payload) => payload,
                Err(err) => { warn!(subject = event.subject(), error = %err, "could not encode event"); continue; }
            };
            if let Err(err) = client.publish(event.subject().to_string(), payload.into()).await {
                warn!(subject = event.subject(), error = %err, "event publish failed");
            }
        }
    }
}
