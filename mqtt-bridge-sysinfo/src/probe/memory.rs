//! Memory usage.

use async_trait::async_trait;
use sysinfo::System;

use hostmetrics_common::{Snapshot, bytes_to_gib, round_to};

use super::{Probe, ProbeError};

pub struct MemoryProbe {
    system: System,
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for MemoryProbe {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn sample(&mut self, _prior: &Snapshot) -> Result<Snapshot, ProbeError> {
        self.system.refresh_memory();
        memory_metrics(self.system.total_memory(), self.system.available_memory())
    }
}

/// Build the `ram_*` keys from byte counts. Used memory is `total - available`.
pub fn memory_metrics(total: u64, available: u64) -> Result<Snapshot, ProbeError> {
    if total == 0 {
        return Err(ProbeError::Unavailable(
            "total memory reported as 0".to_string(),
        ));
    }

    let used = total.saturating_sub(available);
    let percent = used as f64 / total as f64 * 100.0;

    let mut snapshot = Snapshot::new();
    snapshot.insert("ram_percent", round_to(percent, 1));
    snapshot.insert("ram_used_gb", bytes_to_gib(used));
    snapshot.insert("ram_total_gb", bytes_to_gib(total));
    snapshot.insert("ram_available_gb", bytes_to_gib(available));
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostmetrics_common::MetricValue;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_memory_metrics() {
        let snapshot = memory_metrics(16 * GIB, 10 * GIB).unwrap();
        assert_eq!(snapshot.get("ram_percent"), Some(&MetricValue::Float(37.5)));
        assert_eq!(snapshot.get("ram_used_gb"), Some(&MetricValue::Float(6.0)));
        assert_eq!(snapshot.get("ram_total_gb"), Some(&MetricValue::Float(16.0)));
        assert_eq!(
            snapshot.get("ram_available_gb"),
            Some(&MetricValue::Float(10.0))
        );
        assert_eq!(snapshot.len(), 4);
    }

    #[test]
    fn test_binary_gigabytes() {
        let snapshot = memory_metrics(17_179_869_184, 8_589_934_592).unwrap();
        assert_eq!(snapshot.get("ram_total_gb"), Some(&MetricValue::Float(16.0)));
        assert_eq!(snapshot.get("ram_percent"), Some(&MetricValue::Float(50.0)));

        // 15.5 GiB total, 1/3 GiB available
        let snapshot = memory_metrics(16_642_998_272, 357_913_941).unwrap();
        assert_eq!(snapshot.get("ram_total_gb"), Some(&MetricValue::Float(15.5)));
        assert_eq!(snapshot.get("ram_available_gb"), Some(&MetricValue::Float(0.33)));
    }

    #[test]
    fn test_zero_total_is_error() {
        assert!(matches!(
            memory_metrics(0, 0),
            Err(ProbeError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_sample_local_system() {
        let mut probe = MemoryProbe::new();
        let snapshot = probe.sample(&Snapshot::new()).await.unwrap();
        let percent = snapshot.get("ram_percent").and_then(MetricValue::as_f64).unwrap();
        assert!((0.0..=100.0).contains(&percent));
    }
}
