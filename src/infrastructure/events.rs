//! Cart event publishing.

use tracing::{info, warn};

use crate::domain::events::CartEvent;

pub const CART_EVENTS_SUBJECT: &str = "cart.events";

/// Publishes cart events to NATS when a client is configured; otherwise the
/// events are only logged.
#[derive(Debug, Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn log_only() -> Self { Self::default() }

    pub async fn publish(&self, events: &[CartEvent]) {
        for event in events {
            info!(user_id = %event.user_id(), ?event, "cart event");
            let Some(nats) = &self.nats else { continue };
            let payload = match serde_json::to_vec(event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "failed to encode cart event");
                    continue;
                }
            };
            if let Err(e) = nats.publish(CART_EVENTS_SUBJECT.to_string(), payload.into()).await {
                warn!(error = %e, "failed to publish cart event");
            }
        }
    }
}
