//! Block device inventory via `lsblk`, with disk temperatures from `smartctl`.
//!
//! Reports whole-disk sizes and temperatures, and every partition whether
//! mounted or not. Partition entries carry `Inventory` precedence, so a
//! partition that is also mounted keeps the richer entry from the mounts
//! probe.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use hostmetrics_common::{MetricValue, Precedence, Snapshot, bytes_to_gib, disk_key};

use super::{Probe, ProbeError, ToolCommand};
use crate::config::ToolsConfig;

/// `lsblk` columns requested.
pub const LSBLK_COLUMNS: &str = "NAME,SIZE,TYPE,MOUNTPOINT,FSTYPE";

/// Mountpoint value for partitions without one.
pub const NOT_MOUNTED: &str = "not_mounted";

/// smartctl exit codes accepted: 0 = ok, 4 = some SMART values exceeded.
const SMARTCTL_OK: &[i32] = &[0, 4];

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<BlockDevice>,
}

/// One node of the `lsblk -J` tree.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockDevice {
    pub name: String,
    /// Bytes. Older lsblk versions print the number as a string.
    #[serde(default, deserialize_with = "size_bytes")]
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub mountpoint: Option<String>,
    #[serde(default)]
    pub fstype: Option<String>,
    #[serde(default)]
    pub children: Vec<BlockDevice>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeField {
    Number(u64),
    Text(String),
}

fn size_bytes<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<SizeField>::deserialize(deserializer)? {
        None => Ok(None),
        Some(SizeField::Number(n)) => Ok(Some(n)),
        Some(SizeField::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse `lsblk -b -J` output.
pub fn parse_lsblk(json: &[u8]) -> Result<Vec<BlockDevice>, ProbeError> {
    let output: LsblkOutput =
        serde_json::from_slice(json).map_err(|e| ProbeError::parse("lsblk output", e))?;
    Ok(output.blockdevices)
}

/// Disk temperature from `smartctl -a -j` output.
///
/// NVMe drives report `nvme_smart_health_information_log.temperature`;
/// ATA/SCSI drives report `temperature.current`. If the NVMe log is present
/// it is the only source consulted. A zero reading means "unknown".
pub fn parse_smart_temperature(json: &[u8]) -> Result<Option<i64>, ProbeError> {
    let value: serde_json::Value =
        serde_json::from_slice(json).map_err(|e| ProbeError::parse("smartctl output", e))?;

    let temp = if let Some(log) = value.get("nvme_smart_health_information_log") {
        log.get("temperature").and_then(serde_json::Value::as_i64)
    } else if let Some(temperature) = value.get("temperature") {
        temperature.get("current").and_then(serde_json::Value::as_i64)
    } else {
        None
    };

    Ok(temp.filter(|t| *t != 0))
}

/// Whole-disk keys: `disk_{name}_total_size_gb`.
fn disk_entry(device: &BlockDevice, snapshot: &mut Snapshot) {
    if let Some(size) = device.size {
        snapshot.insert(disk_key(&device.name, "total_size_gb"), bytes_to_gib(size));
    }
}

/// Inventory claims for the direct `part` children of `device`.
pub fn partition_entries(device: &BlockDevice, snapshot: &mut Snapshot) {
    for part in device.children.iter().filter(|c| c.kind == "part") {
        let mountpoint = part
            .mountpoint
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(NOT_MOUNTED);
        let fstype = part
            .fstype
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or("unknown");

        let mut fields: Vec<(&str, MetricValue)> = Vec::with_capacity(4);
        if let Some(size) = part.size {
            fields.push(("total_gb", bytes_to_gib(size).into()));
        }
        fields.push(("mountpoint", mountpoint.into()));
        fields.push(("fstype", fstype.into()));
        fields.push(("mounted", false.into()));

        snapshot.claim_device(&part.name, Precedence::Inventory, fields);
    }
}

/// Inventory of all block devices, without temperatures.
pub fn inventory(devices: &[BlockDevice]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for device in devices {
        if device.kind == "disk" {
            disk_entry(device, &mut snapshot);
        }
        partition_entries(device, &mut snapshot);
    }
    snapshot
}

pub struct BlockDevicesProbe {
    lsblk: ToolCommand,
    smartctl: String,
    use_sudo: bool,
    smartctl_timeout: Duration,
}

impl BlockDevicesProbe {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            lsblk: ToolCommand::new(
                &tools.lsblk,
                Duration::from_secs(tools.lsblk_timeout_secs),
            )
            .args(["-b", "-J", "-o", LSBLK_COLUMNS]),
            smartctl: tools.smartctl.clone(),
            use_sudo: tools.use_sudo,
            smartctl_timeout: Duration::from_secs(tools.smartctl_timeout_secs),
        }
    }

    /// Best-effort temperature of `/dev/{disk}`.
    async fn disk_temperature(&self, disk: &str) -> Option<i64> {
        let device = format!("/dev/{}", disk);
        let command = ToolCommand::privileged(&self.smartctl, self.use_sudo, self.smartctl_timeout)
            .args(["-a", device.as_str(), "-j"])
            .accept_exit_codes(SMARTCTL_OK);

        let result = match command.run().await {
            Ok(stdout) => parse_smart_temperature(&stdout),
            Err(e) => Err(e),
        };

        match result {
            Ok(temp) => temp,
            Err(e) => {
                tracing::debug!(disk = %disk, error = %e, "Disk temperature unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl Probe for BlockDevicesProbe {
    fn name(&self) -> &'static str {
        "block_devices"
    }

    async fn sample(&mut self, _prior: &Snapshot) -> Result<Snapshot, ProbeError> {
        let stdout = self.lsblk.run().await?;
        let devices = parse_lsblk(&stdout)?;

        let mut snapshot = inventory(&devices);

        for disk in devices.iter().filter(|d| d.kind == "disk") {
            if let Some(temp) = self.disk_temperature(&disk.name).await {
                snapshot.insert(disk_key(&disk.name, "temp_c"), temp);
            }
        }

        Ok(snapshot)
    }
}
