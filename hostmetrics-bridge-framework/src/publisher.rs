//! Publisher for sending payloads to the MQTT broker.

use std::sync::Arc;

use rumqttc::{AsyncClient, QoS};

use hostmetrics_common::TopicBuilder;

use crate::error::{BridgeError, Result};

/// Destination for serialized metric payloads.
///
/// `submit` queues the payload and returns; it must not wait for the
/// network. Implemented by [`Publisher`]; tests substitute their own sinks.
pub trait MetricsSink: Send + Sync {
    /// Queue `payload` for delivery on `topic`.
    fn submit(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// Publisher for sending telemetry to the MQTT broker.
///
/// Wraps the session's [`AsyncClient`]. Every method only enqueues a request
/// on the client's bounded channel; the background event loop performs the
/// network I/O. Delivery is at-most-once.
#[derive(Clone, Debug)]
pub struct Publisher {
    client: AsyncClient,
    topics: TopicBuilder,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(client: AsyncClient, topics: TopicBuilder) -> Self {
        Self { client, topics }
    }

    /// Get the topic builder.
    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    /// Queue raw bytes for a topic.
    pub fn publish_raw(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, retain, payload)
            .map_err(|e| BridgeError::publish(topic, e.to_string()))
    }

    /// Queue a JSON value for a topic.
    pub fn publish_json<T: serde::Serialize>(
        &self,
        topic: &str,
        value: &T,
        retain: bool,
    ) -> Result<()> {
        let payload = hostmetrics_common::encode(value)?;
        self.publish_raw(topic, payload, retain)
    }

    /// Queue a DISCONNECT for the session.
    pub fn disconnect(&self) -> Result<()> {
        self.client.try_disconnect().map_err(BridgeError::from)
    }
}

impl MetricsSink for Publisher {
    fn submit(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.publish_raw(topic, payload, false)
    }
}

impl<S: MetricsSink + ?Sized> MetricsSink for Arc<S> {
    fn submit(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        (**self).submit(topic, payload)
    }
}

/// Running totals of publish attempts.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublishStats {
    /// Number of payloads handed to the client.
    pub success: usize,
    /// Number of failed attempts.
    pub failed: usize,
}

impl PublishStats {
    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::MqttOptions;

    fn publisher(capacity: usize) -> (Publisher, rumqttc::EventLoop) {
        let options = MqttOptions::new("test", "localhost", 1883);
        let (client, eventloop) = AsyncClient::new(options, capacity);
        (Publisher::new(client, TopicBuilder::new("pc", "test")), eventloop)
    }

    #[test]
    fn test_submit_queues_without_network() {
        let (publisher, _eventloop) = publisher(4);
        let topic = publisher.topics().metrics();
        assert!(publisher.submit(&topic, b"{}".to_vec()).is_ok());
    }

    #[test]
    fn test_submit_fails_when_queue_is_full() {
        let (publisher, _eventloop) = publisher(1);
        let topic = publisher.topics().metrics();
        publisher.submit(&topic, b"{}".to_vec()).unwrap();

        let err = publisher.submit(&topic, b"{}".to_vec()).unwrap_err();
        assert!(matches!(err, BridgeError::Publish { ref topic, .. } if topic == "pc/test/metrics"));
    }

    #[test]
    fn test_submit_fails_after_session_closed() {
        let (publisher, eventloop) = publisher(4);
        drop(eventloop);
        let topic = publisher.topics().metrics();
        assert!(publisher.submit(&topic, b"{}".to_vec()).is_err());
    }

    #[test]
    fn test_publish_stats() {
        let mut stats = PublishStats::default();
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.success_rate(), 100.0);

        stats.success = 8;
        stats.failed = 2;
        assert_eq!(stats.total(), 10);
        assert_eq!(stats.success_rate(), 80.0);
    }
}
