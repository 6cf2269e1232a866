//! MQTT client wrapper.

use crate::config::MqttConfig;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self { client, event_loop }
    }

    /// Run the event loop until `token` is cancelled, forwarding incoming
    /// publishes to `tx`.
    ///
    /// Subscriptions are re-sent on every reconnect because the session is
    /// not persistent on the broker.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<MqttMessage>,
        subscriptions: Vec<String>,
        token: CancellationToken,
    ) {
        info!("[MQTT] Starting event loop");

        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = self.event_loop.poll() => event,
            };
            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("[MQTT] Connected");
                    // The request queue is drained by this loop, so never await it here
                    for topic in &subscriptions {
                        info!("[MQTT] Subscribing to {}", topic);
                        if let Err(e) = self.client.try_subscribe(topic, QoS::AtLeastOnce) {
                            warn!("[MQTT] Failed to subscribe to {}: {}", topic, e);
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[MQTT] Invalid UTF-8 in payload: {}", e);
                            continue;
                        }
                    };

                    debug!("[MQTT] Received on {}: {}", publish.topic, payload);

                    let msg = MqttMessage {
                        topic: publish.topic,
                        payload,
                    };
                    if tx.send(msg).await.is_err() {
                        error!("[MQTT] Message channel closed");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    // Wait before reconnecting
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                    }
                }
            }
        }
        info!("[MQTT] Event loop stopped");
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}
