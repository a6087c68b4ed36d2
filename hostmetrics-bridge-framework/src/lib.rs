//! hostmetrics Bridge Framework
//!
//! Common abstractions for building agents that publish host telemetry to an
//! MQTT broker.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (connect, shutdown, signal handling)
//! - [`Publisher`] for queueing payloads on the broker session
//! - [`MetricsSink`] as the seam between sampling loops and the session
//! - [`BridgeArgs`] for common CLI / environment argument parsing, with
//!   [`load_env_file`] for `.env` support
//! - [`BridgeStatus`] for retained availability reporting
//!
//! # Example
//!
//! ```ignore
//! use hostmetrics_bridge_framework::{BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MyBridgeConfig::load("mybridge.json5")?;
//!
//!     let mut runner = BridgeRunner::new("mybridge", config).await?;
//!
//!     // Spawn sampling workers
//!     runner.spawn(my_worker(runner.publisher()));
//!
//!     // Run until Ctrl+C
//!     runner.run().await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::{BridgeArgs, load_env_file, load_env_file_from};
pub use config::{BridgeConfig, local_hostname};
pub use error::{BridgeError, Result};
pub use publisher::{MetricsSink, PublishStats, Publisher};
pub use runner::{BridgeRunner, shutdown_signal};
pub use status::{BridgeStatus, StatusPublisher};

// Re-export commonly used types from hostmetrics-common
pub use hostmetrics_common::{
    LogFormat, LoggingConfig, MetricValue, MqttConfig, Precedence, Snapshot, TopicBuilder,
};
