//! Flat key/value metric snapshots.
//!
//! A [`Snapshot`] maps metric keys (`cpu_temp_c`, `ram_percent`,
//! `disk_sda1_used_gb`, ...) to scalar [`MetricValue`]s and serializes as a
//! single JSON object. Disk entries are written through device *claims*:
//! each claim records which keys belong to a block device and with what
//! [`Precedence`], so that merging contributions from several sources keeps
//! exactly one entry per device, whatever order the sources ran in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bytes per binary gigabyte.
pub const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A single scalar metric value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    /// Explicitly absent reading (serialized as `null`).
    Null,

    /// Flag such as `disk_sda1_mounted`.
    Boolean(bool),

    /// Whole number such as a SMART temperature.
    Integer(i64),

    /// Measured or derived quantity.
    Float(f64),

    /// Text value such as a mountpoint.
    Text(String),
}

impl MetricValue {
    /// Name of the value kind, for logs and assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricValue::Null => "null",
            MetricValue::Boolean(_) => "boolean",
            MetricValue::Integer(_) => "integer",
            MetricValue::Float(_) => "float",
            MetricValue::Text(_) => "text",
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Integer(v) => Some(*v as f64),
            MetricValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Boolean(v)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Integer(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl<T: Into<MetricValue>> From<Option<T>> for MetricValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(MetricValue::Null)
    }
}

/// How authoritative a disk entry is.
///
/// Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    /// Block-device inventory: size, fstype and mount state only.
    Inventory,
    /// Mounted filesystem: includes used/free capacity.
    Mounted,
}

#[derive(Debug, Clone, PartialEq)]
struct Claim {
    precedence: Precedence,
    keys: Vec<String>,
}

/// One sampling instant's metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    metrics: BTreeMap<String, MetricValue>,
    #[serde(skip)]
    claims: BTreeMap<String, Claim>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain (unclaimed) metric, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) {
        self.metrics.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.metrics.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.metrics.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Iterate metrics in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys starting with `prefix`, in key order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.metrics
            .keys()
            .filter(move |k| k.starts_with(prefix))
            .map(String::as_str)
    }

    /// Precedence of the entry currently representing `device`, if any.
    pub fn device_claim(&self, device: &str) -> Option<Precedence> {
        self.claims.get(device).map(|c| c.precedence)
    }

    /// Devices with an entry in this snapshot.
    pub fn claimed_devices(&self) -> impl Iterator<Item = &str> {
        self.claims.keys().map(String::as_str)
    }

    /// Write the disk entry for `device`.
    ///
    /// `fields` are `(suffix, value)` pairs, stored as `disk_{device}_{suffix}`.
    /// The entry is written only if no entry of equal or higher precedence
    /// exists; a weaker existing entry is removed first. Returns whether the
    /// entry was written.
    pub fn claim_device(
        &mut self,
        device: &str,
        precedence: Precedence,
        fields: Vec<(&str, MetricValue)>,
    ) -> bool {
        let entries = fields
            .into_iter()
            .map(|(suffix, value)| (disk_key(device, suffix), value))
            .collect();
        self.apply_claim(device.to_string(), precedence, entries)
    }

    fn apply_claim(
        &mut self,
        device: String,
        precedence: Precedence,
        entries: Vec<(String, MetricValue)>,
    ) -> bool {
        if let Some(existing) = self.claims.get(&device) {
            if existing.precedence >= precedence {
                return false;
            }
            for key in &existing.keys {
                self.metrics.remove(key);
            }
        }

        let keys = entries.iter().map(|(k, _)| k.clone()).collect();
        self.metrics.extend(entries);
        self.claims.insert(device, Claim { precedence, keys });
        true
    }

    /// Merge another snapshot into this one.
    ///
    /// Plain metrics overwrite by key. Device entries follow
    /// [`claim_device`](Self::claim_device) rules, so the result does not
    /// depend on merge order.
    pub fn merge(&mut self, mut other: Snapshot) {
        for (device, claim) in std::mem::take(&mut other.claims) {
            let entries = claim
                .keys
                .iter()
                .filter_map(|k| other.metrics.remove(k).map(|v| (k.clone(), v)))
                .collect();
            self.apply_claim(device, claim.precedence, entries);
        }
        self.metrics.extend(other.metrics);
    }
}

/// Metric key for a disk attribute: `disk_{device}_{suffix}`.
pub fn disk_key(device: &str, suffix: &str) -> String {
    format!("disk_{}_{}", device, suffix)
}

/// Round to `decimals` decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Convert bytes to binary gigabytes rounded to two decimals.
pub fn bytes_to_gib(bytes: u64) -> f64 {
    round_to(bytes as f64 / GIB, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted_sda1() -> Vec<(&'static str, MetricValue)> {
        vec![
            ("percent", 50.0.into()),
            ("used_gb", 10.0.into()),
            ("total_gb", 20.0.into()),
            ("free_gb", 10.0.into()),
            ("mountpoint", "/".into()),
            ("mounted", true.into()),
        ]
    }

    fn inventory_sda1() -> Vec<(&'static str, MetricValue)> {
        vec![
            ("total_gb", 20.5.into()),
            ("mountpoint", "/".into()),
            ("fstype", "ext4".into()),
            ("mounted", false.into()),
        ]
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_to(48.25, 1), 48.3);
        assert_eq!(round_to(1.0 / 3.0, 2), 0.33);
        assert_eq!(bytes_to_gib(17_179_869_184), 16.0);
        assert_eq!(bytes_to_gib(0), 0.0);
        assert_eq!(bytes_to_gib(1_610_612_736), 1.5);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(MetricValue::from(None::<f64>), MetricValue::Null);
        assert_eq!(MetricValue::from(Some(3.5)), MetricValue::Float(3.5));
        assert_eq!(MetricValue::from(42i64).kind(), "integer");
    }

    #[test]
    fn test_mounted_wins_over_inventory() {
        let mut snapshot = Snapshot::new();
        assert!(snapshot.claim_device("sda1", Precedence::Mounted, mounted_sda1()));
        assert!(!snapshot.claim_device("sda1", Precedence::Inventory, inventory_sda1()));

        assert_eq!(snapshot.get("disk_sda1_mounted"), Some(&MetricValue::Boolean(true)));
        assert_eq!(snapshot.get("disk_sda1_total_gb"), Some(&MetricValue::Float(20.0)));
        assert!(!snapshot.contains_key("disk_sda1_fstype"));
    }

    #[test]
    fn test_mounted_replaces_earlier_inventory() {
        let mut snapshot = Snapshot::new();
        snapshot.claim_device("sda1", Precedence::Inventory, inventory_sda1());
        snapshot.claim_device("sda1", Precedence::Mounted, mounted_sda1());

        assert_eq!(snapshot.device_claim("sda1"), Some(Precedence::Mounted));
        assert_eq!(snapshot.get("disk_sda1_mounted"), Some(&MetricValue::Boolean(true)));
        assert!(!snapshot.contains_key("disk_sda1_fstype"));
        assert_eq!(snapshot.keys_with_prefix("disk_sda1_").count(), 6);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let mut mounted = Snapshot::new();
        mounted.claim_device("sda1", Precedence::Mounted, mounted_sda1());

        let mut inventory = Snapshot::new();
        inventory.claim_device("sda1", Precedence::Inventory, inventory_sda1());
        inventory.claim_device("sdb1", Precedence::Inventory, inventory_sda1());
        inventory.insert("disk_sda_total_size_gb", 931.51);

        let mut forward = Snapshot::new();
        forward.merge(mounted.clone());
        forward.merge(inventory.clone());

        let mut backward = Snapshot::new();
        backward.merge(inventory);
        backward.merge(mounted);

        assert_eq!(forward, backward);
        assert_eq!(forward.get("disk_sdb1_mounted"), Some(&MetricValue::Boolean(false)));
        assert_eq!(forward.get("disk_sda_total_size_gb"), Some(&MetricValue::Float(931.51)));
        let devices: Vec<_> = forward.claimed_devices().collect();
        assert_eq!(devices, vec!["sda1", "sdb1"]);
    }

    #[test]
    fn test_equal_precedence_keeps_first() {
        let mut snapshot = Snapshot::new();
        snapshot.claim_device("sdb1", Precedence::Inventory, vec![("total_gb", 1.0.into())]);
        snapshot.claim_device("sdb1", Precedence::Inventory, vec![("total_gb", 2.0.into())]);
        assert_eq!(snapshot.get("disk_sdb1_total_gb"), Some(&MetricValue::Float(1.0)));
    }

    #[test]
    fn test_plain_metrics_overwrite() {
        let mut a = Snapshot::new();
        a.insert("ram_percent", 10.0);
        let mut b = Snapshot::new();
        b.insert("ram_percent", 20.0);
        a.merge(b);
        assert_eq!(a.get("ram_percent"), Some(&MetricValue::Float(20.0)));
        assert_eq!(a.len(), 1);
    }
}
