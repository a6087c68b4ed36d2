//! hostmetrics Common Library
//!
//! This crate provides shared types and utilities for hostmetrics MQTT bridges:
//!
//! - [`snapshot`] - Flat metric snapshot data model (`Snapshot`, `MetricValue`, device claims)
//! - [`serialization`] - JSON encoding and decoding of payloads
//! - [`config`] - Broker and logging configuration sections
//! - [`session`] - MQTT session establishment
//! - [`topic`] - Topic builders and validation
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod serialization;
pub mod session;
pub mod snapshot;
pub mod topic;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, MqttConfig};
pub use error::{Error, Result};
pub use serialization::{decode, encode, encode_pretty};
pub use session::{MqttSession, connect};
pub use snapshot::{MetricValue, Precedence, Snapshot, bytes_to_gib, disk_key, round_to};
pub use topic::{TopicBuilder, validate_topic_part};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
///
/// # Example
///
/// ```ignore
/// use hostmetrics_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
