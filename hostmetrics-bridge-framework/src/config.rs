//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use hostmetrics_common::{TopicBuilder, validate_topic_part};

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, MqttConfig};

/// Host name of this machine, or `"unknown"` if it cannot be determined.
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use hostmetrics_bridge_framework::{BridgeConfig, MqttConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub mqtt: MqttConfig,
///     pub logging: LoggingConfig,
///     pub topic_base: String,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn mqtt(&self) -> &MqttConfig {
///         &self.mqtt
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn topic_base(&self) -> &str {
///         &self.topic_base
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the MQTT connection configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the topic base for this bridge.
    fn topic_base(&self) -> &str;

    /// Identity used in topics and as the MQTT client id.
    ///
    /// Defaults to the machine's host name.
    fn identity(&self) -> String {
        local_hostname()
    }

    /// Topic builder for this bridge's identity.
    fn topics(&self) -> TopicBuilder {
        TopicBuilder::new(self.topic_base(), self.identity())
    }

    /// Validate the configuration.
    ///
    /// Called automatically after loading. The default checks the
    /// connection and topic settings every bridge needs; override to add
    /// bridge-specific checks and call [`validate_common`](Self::validate_common).
    fn validate(&self) -> Result<()> {
        self.validate_common()
    }

    /// Checks shared by all bridges.
    fn validate_common(&self) -> Result<()> {
        let mqtt = self.mqtt();
        if mqtt.host.is_empty() {
            return Err(BridgeError::validation("MQTT broker host must not be empty"));
        }
        if mqtt.port == 0 {
            return Err(BridgeError::validation("MQTT broker port must be > 0"));
        }
        if mqtt.connect_timeout_secs == 0 {
            return Err(BridgeError::validation("connect_timeout_secs must be > 0"));
        }
        validate_topic_part("topic base", self.topic_base())?;
        validate_topic_part("identity", &self.identity())?;
        if self.identity().contains('/') {
            return Err(BridgeError::validation(format!(
                "identity '{}' must not contain '/'",
                self.identity()
            )));
        }
        Ok(())
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::load_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path without validating it.
    ///
    /// Used when further overrides (environment, CLI) are applied before
    /// validation.
    fn load_unvalidated(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        mqtt: MqttConfig,
        #[serde(default)]
        logging: LoggingConfig,
        topic_base: String,
        #[serde(default)]
        identity: Option<String>,
    }

    impl BridgeConfig for TestConfig {
        fn mqtt(&self) -> &MqttConfig {
            &self.mqtt
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn topic_base(&self) -> &str {
            &self.topic_base
        }

        fn identity(&self) -> String {
            self.identity.clone().unwrap_or_else(local_hostname)
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_and_validate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ mqtt: {{ host: "broker.lan" }}, topic_base: "pc", identity: "nas" }}"#
        )
        .unwrap();

        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.mqtt().host, "broker.lan");
        assert_eq!(config.topics().metrics(), "pc/nas/metrics");
    }

    #[test]
    fn test_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ topic_base: ").unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }

    #[test]
    fn test_wildcards_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ topic_base: "pc/#", identity: "nas" }}"#).unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_identity_with_slash_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ topic_base: "pc", identity: "a/b" }}"#).unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_local_hostname_not_empty() {
        assert!(!local_hostname().is_empty());
    }
}
