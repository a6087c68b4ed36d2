//! The publish cycle: assemble, serialize, submit, sleep.

use std::time::Duration;

use hostmetrics_bridge_framework::{MetricsSink, PublishStats};
use hostmetrics_common::{encode, encode_pretty};

use crate::collector::SnapshotAssembler;

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The payload was handed to the session.
    Published { bytes: usize, metrics: usize },
    /// The cycle was dropped.
    Failed(String),
}

/// Timed loop publishing one snapshot per interval.
pub struct PublishCycle<S: MetricsSink> {
    assembler: SnapshotAssembler,
    sink: S,
    topic: String,
    interval: Duration,
    stats: PublishStats,
}

impl<S: MetricsSink> PublishCycle<S> {
    pub fn new(
        assembler: SnapshotAssembler,
        sink: S,
        topic: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            assembler,
            sink,
            topic: topic.into(),
            interval,
            stats: PublishStats::default(),
        }
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Run a single cycle. Failures are logged and reported, never raised.
    pub async fn run_once(&mut self) -> CycleOutcome {
        let snapshot = self.assembler.assemble().await;
        let metrics = snapshot.len();

        let payload = match encode(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.failed += 1;
                tracing::warn!(error = %e, "Failed to serialize snapshot");
                return CycleOutcome::Failed(e.to_string());
            }
        };
        let bytes = payload.len();

        tracing::info!(topic = %self.topic, metrics, "Publishing snapshot");
        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(pretty) = encode_pretty(&snapshot) {
                tracing::debug!("Snapshot payload:\n{}", pretty);
            }
        }

        match self.sink.submit(&self.topic, payload) {
            Ok(()) => {
                self.stats.success += 1;
                tracing::info!(topic = %self.topic, bytes, "Message queued for delivery");
                CycleOutcome::Published { bytes, metrics }
            }
            Err(e) => {
                self.stats.failed += 1;
                tracing::warn!(
                    topic = %self.topic,
                    error = %e,
                    success_rate = self.stats.success_rate(),
                    "Publish failed, retrying next interval"
                );
                CycleOutcome::Failed(e.to_string())
            }
        }
    }

    /// Loop forever: one cycle, then sleep the interval.
    pub async fn run(mut self) {
        tracing::info!(
            topic = %self.topic,
            interval_secs = self.interval.as_secs(),
            "Starting publish cycle"
        );

        loop {
            self.run_once().await;
            tracing::debug!(
                interval_secs = self.interval.as_secs(),
                "Waiting until next update"
            );
            tokio::time::sleep(self.interval).await;
        }
    }
}
