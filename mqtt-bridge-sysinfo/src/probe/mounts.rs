//! Usage of mounted filesystems.

use async_trait::async_trait;
use sysinfo::Disks;

use hostmetrics_common::{MetricValue, Precedence, Snapshot, bytes_to_gib, round_to};

use super::{Probe, ProbeError};
use crate::config::DiskConfig;

/// One mounted filesystem as reported by the OS.
#[derive(Debug, Clone, PartialEq)]
pub struct MountedDisk {
    /// Block device path, e.g. `/dev/nvme0n1p2`.
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
    pub total: u64,
    pub available: u64,
}

/// Last path component of a device path: `/dev/nvme0n1p2` -> `nvme0n1p2`.
pub fn device_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// Whether a mount source is a block device node.
///
/// Pseudo filesystems (`overlay`, `tmpfs`, FUSE mounts such as `portal`)
/// name no device under `/dev`.
pub fn is_block_device(device: &str) -> bool {
    device
        .strip_prefix("/dev/")
        .is_some_and(|rest| !rest.is_empty())
}

/// Build `Mounted` claims for the disks that pass `filter`.
///
/// Only mounts backed by a block device are reported. Filesystems reporting
/// zero capacity are skipped. When a device is mounted more than once, the
/// first mount listed is kept.
pub fn mounted_entries(disks: &[MountedDisk], filter: &DiskConfig) -> Snapshot {
    let mut snapshot = Snapshot::new();

    for disk in disks {
        if !is_block_device(&disk.device) {
            tracing::trace!(device = %disk.device, mount = %disk.mount_point, "Skipping pseudo filesystem");
            continue;
        }
        if !filter.should_include(&disk.mount_point, &disk.fs_type) {
            continue;
        }
        if disk.total == 0 {
            tracing::debug!(mount = %disk.mount_point, "Skipping filesystem without capacity");
            continue;
        }

        let name = device_name(&disk.device);
        if name.is_empty() {
            continue;
        }

        // Blocks reserved for root count as used.
        let used = disk.total.saturating_sub(disk.available);
        let percent = used as f64 / disk.total as f64 * 100.0;

        let fields: Vec<(&str, MetricValue)> = vec![
            ("percent", round_to(percent, 1).into()),
            ("used_gb", bytes_to_gib(used).into()),
            ("total_gb", bytes_to_gib(disk.total).into()),
            ("free_gb", bytes_to_gib(disk.available).into()),
            ("mountpoint", disk.mount_point.as_str().into()),
            ("mounted", true.into()),
        ];
        snapshot.claim_device(name, Precedence::Mounted, fields);
    }

    snapshot
}

pub struct MountsProbe {
    disks: Disks,
    filter: DiskConfig,
}

impl MountsProbe {
    pub fn new(filter: DiskConfig) -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
            filter,
        }
    }
}

#[async_trait]
impl Probe for MountsProbe {
    fn name(&self) -> &'static str {
        "mounts"
    }

    async fn sample(&mut self, _prior: &Snapshot) -> Result<Snapshot, ProbeError> {
        self.disks.refresh(true);

        let disks: Vec<MountedDisk> = self
            .disks
            .list()
            .iter()
            .map(|disk| MountedDisk {
                device: disk.name().to_string_lossy().to_string(),
                mount_point: disk.mount_point().to_string_lossy().to_string(),
                fs_type: disk.file_system().to_string_lossy().to_string(),
                total: disk.total_space(),
                available: disk.available_space(),
            })
            .collect();

        Ok(mounted_entries(&disks, &self.filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn disk(device: &str, mount: &str, fs: &str, total: u64, available: u64) -> MountedDisk {
        MountedDisk {
            device: device.to_string(),
            mount_point: mount.to_string(),
            fs_type: fs.to_string(),
            total,
            available,
        }
    }

    #[test]
    fn test_device_name() {
        assert_eq!(device_name("/dev/nvme0n1p2"), "nvme0n1p2");
        assert_eq!(device_name("/dev/mapper/vg0-root"), "vg0-root");
        assert_eq!(device_name("sda1"), "sda1");
    }

    #[test]
    fn test_is_block_device() {
        assert!(is_block_device("/dev/sda1"));
        assert!(is_block_device("/dev/mapper/vg0-root"));
        assert!(!is_block_device("overlay"));
        assert!(!is_block_device("portal"));
        assert!(!is_block_device("/dev/"));
    }

    #[test]
    fn test_pseudo_filesystems_skipped() {
        let snapshot = mounted_entries(
            &[
                disk(
                    "overlay",
                    "/var/lib/docker/overlay2/3f1c/merged",
                    "overlay",
                    100 * GIB,
                    40 * GIB,
                ),
                disk(
                    "overlay",
                    "/var/lib/docker/overlay2/9a2e/merged",
                    "overlay",
                    100 * GIB,
                    40 * GIB,
                ),
                disk("portal", "/run/user/1000/doc", "fuse.portal", GIB, GIB),
                disk("/dev/nvme0n1p2", "/", "ext4", 100 * GIB, 40 * GIB),
            ],
            &DiskConfig::default(),
        );

        let devices: Vec<_> = snapshot.claimed_devices().collect();
        assert_eq!(devices, vec!["nvme0n1p2"]);
        assert_eq!(snapshot.keys_with_prefix("disk_overlay_").count(), 0);
        assert_eq!(snapshot.keys_with_prefix("disk_portal_").count(), 0);
        assert_eq!(snapshot.len(), 6);
    }

    #[test]
    fn test_mounted_entry_keys() {
        let snapshot = mounted_entries(
            &[disk("/dev/nvme0n1p2", "/", "ext4", 100 * GIB, 40 * GIB)],
            &DiskConfig::default(),
        );

        assert_eq!(snapshot.device_claim("nvme0n1p2"), Some(Precedence::Mounted));
        assert_eq!(
            snapshot.get("disk_nvme0n1p2_percent"),
            Some(&MetricValue::Float(60.0))
        );
        assert_eq!(
            snapshot.get("disk_nvme0n1p2_used_gb"),
            Some(&MetricValue::Float(60.0))
        );
        assert_eq!(
            snapshot.get("disk_nvme0n1p2_free_gb"),
            Some(&MetricValue::Float(40.0))
        );
        assert_eq!(
            snapshot.get("disk_nvme0n1p2_mountpoint"),
            Some(&MetricValue::Text("/".to_string()))
        );
        assert_eq!(
            snapshot.get("disk_nvme0n1p2_mounted"),
            Some(&MetricValue::Boolean(true))
        );
        assert_eq!(snapshot.len(), 6);
    }

    #[test]
    fn test_filters_and_zero_capacity() {
        let snapshot = mounted_entries(
            &[
                disk("/dev/loop3", "/snap/core22/1380", "squashfs", GIB, 0),
                disk("tmpfs", "/run", "tmpfs", GIB, GIB),
                disk("/dev/sdc1", "/media/usb", "vfat", 0, 0),
                disk("/dev/sda1", "/home", "ext4", 2 * GIB, GIB),
            ],
            &DiskConfig::default(),
        );

        let devices: Vec<_> = snapshot.claimed_devices().collect();
        assert_eq!(devices, vec!["sda1"]);
    }

    #[test]
    fn test_first_mount_of_device_wins() {
        let snapshot = mounted_entries(
            &[
                disk("/dev/sda2", "/", "btrfs", 4 * GIB, 2 * GIB),
                disk("/dev/sda2", "/home", "btrfs", 4 * GIB, 2 * GIB),
            ],
            &DiskConfig::default(),
        );
        assert_eq!(
            snapshot.get("disk_sda2_mountpoint"),
            Some(&MetricValue::Text("/".to_string()))
        );
    }
}
