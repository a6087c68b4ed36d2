//! Bridge availability reporting.
//!
//! A retained message on `<topic_base>/<identity>/status` says whether the
//! agent is online. The same "offline" document is registered as the MQTT
//! last will, so the broker publishes it if the agent dies without a clean
//! shutdown.

use rumqttc::{LastWill, QoS};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::publisher::Publisher;

/// Bridge status information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Bridge name (e.g., "sysinfo").
    pub bridge: String,
    /// Bridge version.
    pub version: String,
    /// Current status ("online", "offline").
    pub status: String,
    /// Additional metadata (bridge-specific).
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl BridgeStatus {
    /// Create a new status with "online" state.
    pub fn online(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: "online".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a status with "offline" state.
    pub fn offline(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: "offline".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Add metadata to the status.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Queue this status as a retained message on the status topic.
    pub fn publish(&self, publisher: &Publisher) -> Result<()> {
        let topic = publisher.topics().status();
        publisher.publish_json(&topic, self, true)
    }

    /// Build the last will carrying this status.
    pub fn last_will(&self, topic: impl Into<String>) -> Result<LastWill> {
        let payload = hostmetrics_common::encode(self)?;
        Ok(LastWill::new(topic, payload, QoS::AtMostOnce, true))
    }
}

/// Helper to publish bridge status on startup and shutdown.
pub struct StatusPublisher {
    publisher: Publisher,
    bridge_name: String,
    version: String,
}

impl StatusPublisher {
    /// Create a new status publisher.
    pub fn new(
        publisher: Publisher,
        bridge_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            bridge_name: bridge_name.into(),
            version: version.into(),
        }
    }

    /// Publish "online" status with optional metadata.
    pub fn publish_online(&self, metadata: Option<serde_json::Value>) -> Result<()> {
        let mut status = BridgeStatus::online(&self.bridge_name, &self.version);
        if let Some(meta) = metadata {
            status = status.with_metadata(meta);
        }
        status.publish(&self.publisher)
    }

    /// Publish "offline" status.
    pub fn publish_offline(&self) -> Result<()> {
        BridgeStatus::offline(&self.bridge_name, &self.version).publish(&self.publisher)
    }
}
