//! MQTT agent for host monitoring.
//!
//! Samples local hardware metrics and publishes them to an MQTT broker as
//! one JSON document per interval.

use anyhow::Result;
use clap::Parser;
use hostmetrics_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, load_env_file};

use mqtt_bridge_sysinfo::collector::SnapshotAssembler;
use mqtt_bridge_sysinfo::config::SysinfoBridgeConfig;
use mqtt_bridge_sysinfo::cycle::PublishCycle;

#[derive(Parser, Debug)]
#[command(name = "mqtt-bridge-sysinfo", version, about)]
struct Cli {
    #[command(flatten)]
    bridge: BridgeArgs,

    /// Seconds between snapshots.
    #[arg(long, env = "INTERVAL")]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env values back the environment fallbacks of the CLI
    let env_file = load_env_file()?;
    let cli = Cli::parse();

    // Defaults < config file < environment / CLI
    let config = SysinfoBridgeConfig::resolve(&cli.bridge, cli.interval)?;

    // Connect to the broker; failure here is fatal
    let runner = BridgeRunner::new_with_args("sysinfo", config, Some(&cli.bridge)).await?;
    let mut runner = runner.with_status_publishing();

    if let Some(path) = env_file {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    let sysinfo_config = runner.config().sysinfo.clone();
    let identity = runner.topics().identity().to_string();
    let topic = runner.topics().metrics();
    let interval = runner.config().poll_interval();

    tracing::info!(identity = %identity, "PC metrics to Home Assistant MQTT bridge");
    tracing::info!(topic = %topic, interval_secs = interval.as_secs(), "Publishing metrics");
    let mqtt = runner.config().mqtt();
    if mqtt.has_credentials() {
        tracing::info!(username = %mqtt.username, "Authentication: enabled");
    } else {
        tracing::info!("Authentication: disabled (anonymous connection)");
    }

    let assembler = SnapshotAssembler::from_config(&sysinfo_config);
    tracing::info!(probes = ?assembler.probe_names(), "Probes enabled");

    let cycle = PublishCycle::new(assembler, runner.publisher(), topic, interval);
    runner.spawn(cycle.run());

    // Build status metadata
    let metadata = serde_json::json!({
        "identity": identity,
        "collect": {
            "cpu_temp": sysinfo_config.collect.cpu_temp,
            "gpu": sysinfo_config.collect.gpu,
            "memory": sysinfo_config.collect.memory,
            "disks": sysinfo_config.collect.disks,
            "block_devices": sysinfo_config.collect.block_devices,
        },
        "poll_interval_secs": sysinfo_config.poll_interval_secs,
    });

    // Run until Ctrl+C / SIGTERM (handles shutdown gracefully)
    runner.run_with_metadata(Some(metadata)).await?;
    Ok(())
}
