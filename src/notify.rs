//! Outbound notifications about completed moves.

use async_trait::async_trait;
use log::{info, warn};
use rumqttc::{AsyncClient, QoS};
use serde::Serialize;
use std::time::Duration;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives a short subject and a body for every notable event.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        info!("[Notify] {}: {}", subject, body);
    }
}

#[derive(Serialize)]
struct NotificationPayload<'a> {
    subject: &'a str,
    body: &'a str,
}

/// Publishes notifications as JSON to `<prefix>/notifications`.
pub struct MqttNotifier {
    client: AsyncClient,
    topic: String,
}

impl MqttNotifier {
    pub fn new(client: AsyncClient, topic_prefix: &str) -> Self {
        Self {
            client,
            topic: format!("{}/notifications", topic_prefix),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl Notifier for MqttNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        let payload = match serde_json::to_string(&NotificationPayload { subject, body }) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[MQTT] Failed to encode notification: {}", e);
                return;
            }
        };
        let publish = self
            .client
            .publish(&self.topic, QoS::AtLeastOnce, false, payload.into_bytes());
        // The request queue fills up while the broker is unreachable
        match tokio::time::timeout(PUBLISH_TIMEOUT, publish).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[MQTT] Failed to publish notification: {}", e),
            Err(_) => warn!("[MQTT] Timed out publishing notification '{}'", subject),
        }
    }
}
