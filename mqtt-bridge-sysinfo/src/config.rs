//! Configuration for the sysinfo bridge.
//!
//! Settings resolve in three layers: built-in defaults, an optional JSON5
//! file, then environment variables / CLI flags.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use hostmetrics_bridge_framework::{
    BridgeArgs, BridgeConfig, BridgeError, LoggingConfig, MqttConfig, Result, local_hostname,
};
use hostmetrics_common::topic::DEFAULT_TOPIC_BASE;

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SysinfoBridgeConfig {
    /// MQTT broker connection settings.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Sampling settings.
    #[serde(default)]
    pub sysinfo: SysinfoConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// System information collection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysinfoConfig {
    /// Topic base (default: "pc").
    #[serde(default = "default_topic_base")]
    pub topic_base: String,

    /// Identity used in topics and as MQTT client id.
    /// Use "auto" to use the host name (default).
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Seconds between snapshots (default: 30).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Which probes to run.
    #[serde(default)]
    pub collect: CollectConfig,

    /// CPU temperature source.
    #[serde(default)]
    pub cpu: CpuConfig,

    /// Mounted filesystem filters.
    #[serde(default)]
    pub disk: DiskConfig,

    /// External tool locations and limits.
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for SysinfoConfig {
    fn default() -> Self {
        Self {
            topic_base: default_topic_base(),
            hostname: default_hostname(),
            poll_interval_secs: default_poll_interval(),
            collect: CollectConfig::default(),
            cpu: CpuConfig::default(),
            disk: DiskConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

fn default_topic_base() -> String {
    DEFAULT_TOPIC_BASE.to_string()
}

fn default_hostname() -> String {
    "auto".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Configuration for which probes run each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// CPU package temperature from hwmon.
    #[serde(default = "default_true")]
    pub cpu_temp: bool,

    /// NVIDIA GPU statistics via nvidia-smi.
    #[serde(default = "default_true")]
    pub gpu: bool,

    /// Memory usage.
    #[serde(default = "default_true")]
    pub memory: bool,

    /// Mounted filesystem usage.
    #[serde(default = "default_true")]
    pub disks: bool,

    /// Block device inventory (unmounted partitions, disk sizes and temperatures).
    #[serde(default = "default_true")]
    pub block_devices: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            cpu_temp: true,
            gpu: true,
            memory: true,
            disks: true,
            block_devices: true,
        }
    }
}

impl CollectConfig {
    fn any_enabled(&self) -> bool {
        self.cpu_temp || self.gpu || self.memory || self.disks || self.block_devices
    }
}

/// CPU temperature configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuConfig {
    /// hwmon chip name whose sensors are averaged (default: "coretemp").
    #[serde(default = "default_chip")]
    pub chip: String,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            chip: default_chip(),
        }
    }
}

fn default_chip() -> String {
    "coretemp".to_string()
}

/// Mounted filesystem filtering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskConfig {
    /// Filesystem types to skip.
    #[serde(default = "default_exclude_fstypes")]
    pub exclude_fstypes: Vec<String>,

    /// Mount point prefixes to skip.
    #[serde(default = "default_exclude_mount_prefixes")]
    pub exclude_mount_prefixes: Vec<String>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            exclude_fstypes: default_exclude_fstypes(),
            exclude_mount_prefixes: default_exclude_mount_prefixes(),
        }
    }
}

fn default_exclude_fstypes() -> Vec<String> {
    ["squashfs", "tmpfs", "devtmpfs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_mount_prefixes() -> Vec<String> {
    vec!["/snap".to_string(), "/loop".to_string()]
}

impl DiskConfig {
    /// Check if a mount point should be included.
    pub fn should_include(&self, mount_point: &str, fs_type: &str) -> bool {
        if self
            .exclude_mount_prefixes
            .iter()
            .any(|p| mount_point.starts_with(p.as_str()))
        {
            return false;
        }

        !self.exclude_fstypes.iter().any(|t| t == fs_type)
    }
}

/// External tools used by the GPU and block device probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_lsblk")]
    pub lsblk: String,

    #[serde(default = "default_smartctl")]
    pub smartctl: String,

    #[serde(default = "default_nvidia_smi")]
    pub nvidia_smi: String,

    /// Run smartctl through `sudo -n` (never prompts).
    #[serde(default = "default_true")]
    pub use_sudo: bool,

    #[serde(default = "default_lsblk_timeout")]
    pub lsblk_timeout_secs: u64,

    #[serde(default = "default_smartctl_timeout")]
    pub smartctl_timeout_secs: u64,

    #[serde(default = "default_gpu_timeout")]
    pub gpu_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            lsblk: default_lsblk(),
            smartctl: default_smartctl(),
            nvidia_smi: default_nvidia_smi(),
            use_sudo: true,
            lsblk_timeout_secs: default_lsblk_timeout(),
            smartctl_timeout_secs: default_smartctl_timeout(),
            gpu_timeout_secs: default_gpu_timeout(),
        }
    }
}

fn default_lsblk() -> String {
    "lsblk".to_string()
}

fn default_smartctl() -> String {
    "smartctl".to_string()
}

fn default_nvidia_smi() -> String {
    "nvidia-smi".to_string()
}

fn default_lsblk_timeout() -> u64 {
    5
}

fn default_smartctl_timeout() -> u64 {
    3
}

fn default_gpu_timeout() -> u64 {
    5
}

impl SysinfoBridgeConfig {
    /// Resolve the configuration from defaults, the optional config file,
    /// and environment / CLI overrides, then validate it.
    pub fn resolve(args: &BridgeArgs, interval_secs: Option<u64>) -> Result<Self> {
        let mut config = match args.config {
            Some(ref path) => Self::load_unvalidated(path)?,
            None => Self::default(),
        };

        args.apply_mqtt(&mut config.mqtt);
        if let Some(base) = args.topic_base_override() {
            config.sysinfo.topic_base = base.to_string();
        }
        if let Some(name) = args.name_override() {
            config.sysinfo.hostname = name.to_string();
        }
        if let Some(secs) = interval_secs {
            config.sysinfo.poll_interval_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    /// Time between snapshots.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sysinfo.poll_interval_secs)
    }
}

impl BridgeConfig for SysinfoBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn topic_base(&self) -> &str {
        &self.sysinfo.topic_base
    }

    fn identity(&self) -> String {
        match self.sysinfo.hostname.as_str() {
            "" | "auto" => local_hostname(),
            name => name.to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        self.validate_common()?;

        if self.sysinfo.poll_interval_secs == 0 {
            return Err(BridgeError::validation("poll_interval_secs must be > 0"));
        }

        if !self.sysinfo.collect.any_enabled() {
            return Err(BridgeError::validation(
                "At least one metric type must be enabled",
            ));
        }

        let tools = &self.sysinfo.tools;
        if tools.lsblk_timeout_secs == 0
            || tools.smartctl_timeout_secs == 0
            || tools.gpu_timeout_secs == 0
        {
            return Err(BridgeError::validation("tool timeouts must be > 0"));
        }

        Ok(())
    }
}
