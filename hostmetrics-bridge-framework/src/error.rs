//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The initial broker connection could not be established.
    #[error(
        "Failed to connect to MQTT broker at {broker}: {message}\n\
         Check that:\n  \
         1. The MQTT broker is running at {broker}\n  \
         2. MQTT_BROKER and MQTT_PORT (environment, .env file or config) are correct\n  \
         3. A firewall allows connections to the broker port\n  \
         4. The broker host is reachable from this machine"
    )]
    MqttConnection { broker: String, message: String },

    /// MQTT session error after startup.
    #[error("MQTT session error: {0}")]
    MqttSession(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Publishing error.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a publish error.
    pub fn publish(topic: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: msg.into(),
        }
    }
}

impl From<hostmetrics_common::Error> for BridgeError {
    fn from(err: hostmetrics_common::Error) -> Self {
        match err {
            hostmetrics_common::Error::Config(msg) => Self::Config(msg),
            hostmetrics_common::Error::Topic(msg) => Self::ConfigValidation(msg),
            hostmetrics_common::Error::Json(e) => Self::Serialization(e.to_string()),
            hostmetrics_common::Error::Io(e) => Self::Io(e),
            hostmetrics_common::Error::Mqtt(msg) => Self::MqttSession(msg),
        }
    }
}

impl From<rumqttc::ClientError> for BridgeError {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::MqttSession(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_names_broker_and_causes() {
        let err = BridgeError::MqttConnection {
            broker: "192.168.1.10:1883".to_string(),
            message: "Connection refused".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("Failed to connect to MQTT broker at 192.168.1.10:1883"));
        assert!(text.contains("broker is running"));
        assert!(text.contains("firewall"));
        assert!(text.contains(".env file"));
        assert!(text.contains("reachable"));
    }

    #[test]
    fn test_common_error_conversion() {
        let err: BridgeError = hostmetrics_common::Error::Topic("bad".to_string()).into();
        assert!(matches!(err, BridgeError::ConfigValidation(_)));

        let err: BridgeError = hostmetrics_common::Error::Mqtt("closed".to_string()).into();
        assert!(matches!(err, BridgeError::MqttSession(_)));
    }
}
