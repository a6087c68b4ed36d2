//! CLI argument parsing for bridges.
//!
//! Every connection setting can also come from the environment, so a bridge
//! runs without a config file: `MQTT_BROKER=10.0.0.2 mqtt-bridge-sysinfo`.
//! The same variables may be kept in a `.env` file, see [`load_env_file`].

use std::path::{Path, PathBuf};

use clap::Args;

use hostmetrics_common::MqttConfig;

use crate::error::{BridgeError, Result};

/// Load `KEY=value` pairs from a `.env` file in the current directory or one
/// of its parents into the process environment.
///
/// Must run before argument parsing so the `env = ...` fallbacks below see
/// the file's values. Variables already set in the environment win over the
/// file. Returns the path of the loaded file, or `None` when there is none.
pub fn load_env_file() -> Result<Option<PathBuf>> {
    env_file_result(dotenvy::dotenv())
}

/// Like [`load_env_file`], reading the file at `path`.
pub fn load_env_file_from(path: impl AsRef<Path>) -> Result<Option<PathBuf>> {
    let path = path.as_ref();
    env_file_result(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

fn env_file_result(result: dotenvy::Result<PathBuf>) -> Result<Option<PathBuf>> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(BridgeError::config(format!(
            "Failed to load .env file: {}",
            e
        ))),
    }
}

/// Common CLI arguments for all bridges.
#[derive(Args, Debug, Clone, Default)]
pub struct BridgeArgs {
    /// Path to an optional JSON5 configuration file.
    #[arg(short, long, env = "HOSTMETRICS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// MQTT broker host.
    #[arg(long, env = "MQTT_BROKER")]
    pub broker: Option<String>,

    /// MQTT broker port.
    #[arg(long, env = "MQTT_PORT")]
    pub port: Option<u16>,

    /// MQTT username (anonymous unless both username and password are set).
    #[arg(long, env = "MQTT_USERNAME")]
    pub username: Option<String>,

    /// MQTT password.
    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Topic base; messages go to `<topic-base>/<name>/metrics`.
    #[arg(long, env = "TOPIC_BASE")]
    pub topic_base: Option<String>,

    /// Agent identity used in topics and as MQTT client id (default: host name).
    #[arg(long, env = "PC_NAME")]
    pub name: Option<String>,
}

impl BridgeArgs {
    /// Apply connection overrides on top of a loaded configuration.
    pub fn apply_mqtt(&self, mqtt: &mut MqttConfig) {
        if let Some(ref broker) = self.broker {
            mqtt.host = broker.clone();
        }
        if let Some(port) = self.port {
            mqtt.port = port;
        }
        if let Some(ref username) = self.username {
            mqtt.username = username.clone();
        }
        if let Some(ref password) = self.password {
            mqtt.password = password.clone();
        }
    }

    /// Identity override, ignoring empty values (`PC_NAME=` means "use host name").
    pub fn name_override(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    /// Topic base override, ignoring empty values.
    pub fn topic_base_override(&self) -> Option<&str> {
        self.topic_base.as_deref().filter(|b| !b.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        bridge: BridgeArgs,
    }

    #[test]
    fn test_parse_overrides() {
        let cli = TestCli::try_parse_from([
            "bridge",
            "--broker",
            "10.0.0.2",
            "--port",
            "1884",
            "--name",
            "nas",
        ])
        .unwrap();

        let mut mqtt = MqttConfig::default();
        cli.bridge.apply_mqtt(&mut mqtt);

        assert_eq!(mqtt.host, "10.0.0.2");
        assert_eq!(mqtt.port, 1884);
        assert_eq!(cli.bridge.name_override(), Some("nas"));
        assert!(cli.bridge.config.is_none());
    }

    #[test]
    fn test_empty_name_means_hostname() {
        let args = BridgeArgs {
            name: Some(String::new()),
            topic_base: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(args.name_override(), None);
        assert_eq!(args.topic_base_override(), None);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut mqtt = MqttConfig {
            host: "broker.lan".to_string(),
            ..Default::default()
        };
        BridgeArgs::default().apply_mqtt(&mut mqtt);
        assert_eq!(mqtt.host, "broker.lan");
        assert_eq!(mqtt.port, 1883);
    }
}
