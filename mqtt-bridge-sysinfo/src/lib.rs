//! MQTT agent for host monitoring.
//!
//! Samples local hardware metrics (CPU temperature, NVIDIA GPUs, memory,
//! mounted filesystems, block devices and their SMART temperature) and
//! publishes them as a single flat JSON object per interval.
//!
//! # Topics
//!
//! ```text
//! <topic_base>/<identity>/metrics   one snapshot per interval (QoS 0)
//! <topic_base>/<identity>/status    retained "online" / "offline"
//! ```
//!
//! # Payload
//!
//! ```text
//! {
//!   "cpu_temp_c": 48.3,
//!   "gpu0_temp_c": 41.0,
//!   "ram_percent": 37.2,
//!   "disk_nvme0n1p2_percent": 63.1,
//!   "disk_sdb1_mountpoint": "not_mounted",
//!   "disk_nvme0n1_temp_c": 38,
//!   ...
//! }
//! ```

pub mod collector;
pub mod config;
pub mod cycle;
pub mod probe;
