//! MQTT command input and status output.
//!
//! Shades are commanded by publishing `auto`, `manual`, `manual/up` or
//! `manual/down` to `<prefix>/<shade>/set`. The shade status is published,
//! retained, to `<prefix>/<shade>/state` after every handled command and
//! every completed move.

mod client;
mod integration;

pub use client::{MqttClient, MqttMessage};
pub use integration::{MqttIntegration, command_topic, parse_command_topic, state_topic};
