//! Bridge runner for lifecycle management.

use std::future::Future;
use std::time::Duration;

use rumqttc::{Event, EventLoop, Outgoing, Packet};
use tokio::signal;
use tokio::task::JoinHandle;

use hostmetrics_common::{LoggingConfig, TopicBuilder, connect, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::Publisher;
use crate::status::{BridgeStatus, StatusPublisher};

/// Pause between event loop polls after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How long shutdown waits for the event loop to flush the DISCONNECT.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - The MQTT session: connected once at startup, driven by a background task
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C / SIGTERM
/// - Availability publishing (optional)
///
/// # Example
///
/// ```ignore
/// use hostmetrics_bridge_framework::{BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = MyBridgeConfig::load("mybridge.json5")?;
///
///     let mut runner = BridgeRunner::new("mybridge", config).await?;
///
///     let publisher = runner.publisher();
///     runner.spawn(async move {
///         // Worker logic here
///     });
///
///     runner.run().await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging and status.
    name: String,
    /// Bridge version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Publisher wrapping the session's client handle.
    publisher: Publisher,
    /// Status publisher (optional).
    status_publisher: Option<StatusPublisher>,
    /// Background task driving the session's network I/O.
    network: JoinHandle<()>,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    ///
    /// This will:
    /// 1. Initialize logging based on config (with optional CLI override)
    /// 2. Connect to the MQTT broker, registering an "offline" last will
    /// 3. Start the background network task and create the publisher
    ///
    /// A failed connection is returned as [`BridgeError::MqttConnection`];
    /// there is no retry.
    pub async fn new(name: impl Into<String>, config: C) -> Result<Self> {
        Self::new_with_args(name, config, None).await
    }

    /// Create a new bridge runner with CLI args for log level override.
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        // Initialize logging with optional CLI override
        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..config.logging().clone()
            },
            None => config.logging().clone(),
        };

        if let Err(e) = init_tracing(&log_config) {
            // A subscriber is already installed (tests, embedding); keep it.
            tracing::debug!(error = %e, "Tracing already initialized");
        }

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let topics = config.topics();
        let will = BridgeStatus::offline(&name, &version).last_will(topics.status())?;

        let session = connect(config.mqtt(), topics.identity(), Some(will))
            .await
            .map_err(|e| BridgeError::MqttConnection {
                broker: config.mqtt().address(),
                message: e.to_string(),
            })?;

        let network = tokio::spawn(drive_event_loop(session.eventloop));
        let publisher = Publisher::new(session.client, topics);

        Ok(Self {
            name,
            version,
            config,
            publisher,
            status_publisher: None,
            network,
            tasks: Vec::new(),
        })
    }

    /// Enable availability publishing.
    ///
    /// When enabled, the runner will publish a retained "online" status on
    /// startup and "offline" on shutdown.
    pub fn with_status_publishing(mut self) -> Self {
        self.status_publisher = Some(StatusPublisher::new(
            self.publisher.clone(),
            &self.name,
            &self.version,
        ));
        self
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the bridge version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get the topic builder for this bridge.
    pub fn topics(&self) -> &TopicBuilder {
        self.publisher.topics()
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run the bridge until Ctrl+C or SIGTERM is received.
    pub async fn run(self) -> Result<()> {
        self.run_with_metadata(None).await
    }

    /// Run the bridge with custom status metadata.
    pub async fn run_with_metadata(self, metadata: Option<serde_json::Value>) -> Result<()> {
        self.run_until(shutdown_signal(), metadata).await
    }

    /// Run the bridge until `shutdown` completes.
    ///
    /// This will:
    /// 1. Publish "online" status (if enabled)
    /// 2. Wait for `shutdown`
    /// 3. Abort all spawned tasks
    /// 4. Publish "offline" status (if enabled)
    /// 5. Disconnect and stop the network task
    ///
    /// Errors during teardown are logged and swallowed.
    pub async fn run_until<S>(self, shutdown: S, metadata: Option<serde_json::Value>) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        if let Some(ref status_pub) = self.status_publisher {
            if let Err(e) = status_pub.publish_online(metadata) {
                tracing::warn!(error = %e, "Failed to publish online status");
            }
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        shutdown.await;

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }

        if let Some(ref status_pub) = self.status_publisher {
            if let Err(e) = status_pub.publish_offline() {
                tracing::warn!(error = %e, "Failed to publish offline status");
            }
        }

        if let Err(e) = self.publisher.disconnect() {
            tracing::warn!(error = %e, "Error disconnecting from MQTT broker");
        }

        let mut network = self.network;
        if tokio::time::timeout(FLUSH_TIMEOUT, &mut network).await.is_err() {
            tracing::debug!("Network task did not finish in time, aborting");
            network.abort();
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}

/// Poll the session's event loop until a DISCONNECT has been sent.
///
/// Connection errors are logged; the next poll reconnects.
async fn drive_event_loop(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(code = ?ack.code, "MQTT session re-established");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect sent");
                break;
            }
            Ok(event) => {
                tracing::trace!(?event, "MQTT event");
            }
            Err(e) => {
                tracing::warn!(error = %e, "MQTT connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
