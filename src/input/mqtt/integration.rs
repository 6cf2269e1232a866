//! MQTT integration: routes commands to the controller and publishes shade
//! status.

use super::client::{MqttClient, MqttMessage};
use crate::controller::{Command, Controller};
use crate::shade::ShadeStatus;
use log::{info, warn};
use rumqttc::{AsyncClient, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// `<prefix>/<shade>/set`
pub fn command_topic(prefix: &str, shade: &str) -> String {
    format!("{}/{}/set", prefix, shade)
}

/// `<prefix>/<shade>/state`
pub fn state_topic(prefix: &str, shade: &str) -> String {
    format!("{}/{}/state", prefix, shade)
}

/// Shade name from a command topic, if `topic` is one.
pub fn parse_command_topic<'a>(prefix: &str, topic: &'a str) -> Option<&'a str> {
    let shade = topic
        .strip_prefix(prefix)?
        .strip_prefix('/')?
        .strip_suffix("/set")?;
    (!shade.is_empty() && !shade.contains('/')).then_some(shade)
}

pub struct MqttIntegration {
    controller: Arc<Controller>,
    publisher: AsyncClient,
    prefix: String,
}

impl MqttIntegration {
    pub fn new(
        controller: Arc<Controller>,
        client: &MqttClient,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            publisher: client.client(),
            prefix: prefix.into(),
        }
    }

    /// Spawn the event loop, the command processor and the status publisher
    /// on `tracker`. All of them stop when `token` is cancelled.
    pub fn start(self, client: MqttClient, tracker: &TaskTracker, token: CancellationToken) {
        let subscriptions = vec![format!("{}/+/set", self.prefix)];
        let (tx, rx) = mpsc::channel::<MqttMessage>(100);
        tracker.spawn(client.run(tx, subscriptions, token.clone()));

        let integration = Arc::new(self);
        for shade in integration.controller.shades() {
            tracker.spawn(
                integration
                    .clone()
                    .publish_moves(shade.name().to_string(), token.clone()),
            );
        }
        tracker.spawn(integration.process(rx, token));
    }

    async fn process(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<MqttMessage>,
        token: CancellationToken,
    ) {
        // Initial retained status
        for status in self.controller.statuses() {
            self.publish_status(&status).await;
        }

        loop {
            let msg = tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            self.handle_message(&msg).await;
        }
    }

    async fn handle_message(&self, msg: &MqttMessage) {
        let Some(shade) = parse_command_topic(&self.prefix, &msg.topic) else {
            return;
        };
        let command = match Command::parse(&msg.payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("[MQTT] {}: {}", shade, e);
                return;
            }
        };

        info!("[MQTT] {}: {}", shade, command);
        if let Err(e) = self.controller.command(shade, command) {
            warn!("[MQTT] {}: {}", shade, e);
            return;
        }
        if let Ok(shade) = self.controller.shade(shade) {
            self.publish_status(&shade.status()).await;
        }
    }

    /// Publish the status of `name` after each completed move.
    async fn publish_moves(self: Arc<Self>, name: String, token: CancellationToken) {
        let Ok(shade) = self.controller.shade(&name).cloned() else {
            return;
        };
        let mut events = shade.subscribe();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Err(broadcast::error::RecvError::Closed) => break,
                    // A lagged receiver still publishes the latest status
                    _ => self.publish_status(&shade.status()).await,
                },
            }
        }
    }

    async fn publish_status(&self, status: &ShadeStatus) {
        let payload = match serde_json::to_vec(status) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[MQTT] Failed to encode status: {}", e);
                return;
            }
        };
        let topic = state_topic(&self.prefix, &status.name);
        let publish = self.publisher.publish(topic, QoS::AtLeastOnce, true, payload);
        // The request queue is bounded; do not hang when the broker is gone
        match tokio::time::timeout(Duration::from_secs(5), publish).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[MQTT] Failed to publish status of {}: {}", status.name, e),
            Err(_) => warn!("[MQTT] Timed out publishing status of {}", status.name),
        }
    }
}
