//! CPU temperature from the kernel hwmon interface.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use hostmetrics_common::{MetricValue, Snapshot, round_to};

use super::{Probe, ProbeError};

pub const HWMON_ROOT: &str = "/sys/class/hwmon";

/// Averages every `temp*_input` sensor of the configured hwmon chip.
pub struct CpuTempProbe {
    root: PathBuf,
    chip: String,
}

impl CpuTempProbe {
    pub fn new(chip: impl Into<String>) -> Self {
        Self::with_root(HWMON_ROOT, chip)
    }

    pub fn with_root(root: impl Into<PathBuf>, chip: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            chip: chip.into(),
        }
    }
}

#[async_trait]
impl Probe for CpuTempProbe {
    fn name(&self) -> &'static str {
        "cpu_temp"
    }

    async fn sample(&mut self, _prior: &Snapshot) -> Result<Snapshot, ProbeError> {
        let readings = read_chip_temperatures(&self.root, &self.chip);
        if readings.is_empty() {
            tracing::debug!(chip = %self.chip, "No CPU temperature sensors found");
        }

        let mut snapshot = Snapshot::new();
        snapshot.insert("cpu_temp_c", MetricValue::from(mean_celsius(&readings)));
        Ok(snapshot)
    }
}

/// Read all sensors of every hwmon chip named `chip`, in °C.
///
/// Unreadable directories and sensors are skipped.
pub fn read_chip_temperatures(root: &Path, chip: &str) -> Vec<f64> {
    let mut temps = Vec::new();

    let Ok(entries) = std::fs::read_dir(root) else {
        return temps;
    };

    for entry in entries.flatten() {
        let hwmon_path = entry.path();

        let chip_name = std::fs::read_to_string(hwmon_path.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if chip_name != chip {
            continue;
        }

        let Ok(files) = std::fs::read_dir(&hwmon_path) else {
            continue;
        };

        for file in files.flatten() {
            let file_name = file.file_name().to_string_lossy().to_string();
            if !file_name.starts_with("temp") || !file_name.ends_with("_input") {
                continue;
            }

            let Ok(raw) = std::fs::read_to_string(file.path()) else {
                continue;
            };
            // millidegrees Celsius
            if let Ok(milli) = raw.trim().parse::<i64>() {
                temps.push(milli as f64 / 1000.0);
            }
        }
    }

    temps
}

/// Mean of `readings` rounded to one decimal, or `None` if there are none.
pub fn mean_celsius(readings: &[f64]) -> Option<f64> {
    if readings.is_empty() {
        return None;
    }
    let sum: f64 = readings.iter().sum();
    Some(round_to(sum / readings.len() as f64, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn chip(root: &Path, dir: &str, name: &str, sensors: &[(&str, &str)]) {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("name"), format!("{}\n", name)).unwrap();
        for (file, value) in sensors {
            fs::write(path.join(file), format!("{}\n", value)).unwrap();
        }
    }

    #[test]
    fn test_mean_celsius() {
        assert_eq!(mean_celsius(&[]), None);
        assert_eq!(mean_celsius(&[45.0, 50.0, 50.0]), Some(48.3));
        assert_eq!(mean_celsius(&[61.5]), Some(61.5));
    }

    #[tokio::test]
    async fn test_averages_matching_chip_only() {
        let root = tempfile::tempdir().unwrap();
        chip(
            root.path(),
            "hwmon0",
            "acpitz",
            &[("temp1_input", "90000")],
        );
        chip(
            root.path(),
            "hwmon1",
            "coretemp",
            &[
                ("temp1_input", "45000"),
                ("temp2_input", "50000"),
                ("temp3_input", "50000"),
                ("temp1_label", "Package id 0"),
                ("temp1_crit", "100000"),
            ],
        );

        let mut probe = CpuTempProbe::with_root(root.path(), "coretemp");
        let snapshot = probe.sample(&Snapshot::new()).await.unwrap();
        assert_eq!(snapshot.get("cpu_temp_c"), Some(&MetricValue::Float(48.3)));
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_chip_reports_null() {
        let root = tempfile::tempdir().unwrap();
        chip(root.path(), "hwmon0", "nvme", &[("temp1_input", "38850")]);

        let mut probe = CpuTempProbe::with_root(root.path(), "coretemp");
        let snapshot = probe.sample(&Snapshot::new()).await.unwrap();
        assert_eq!(snapshot.get("cpu_temp_c"), Some(&MetricValue::Null));
    }

    #[tokio::test]
    async fn test_missing_hwmon_root_reports_null() {
        let mut probe = CpuTempProbe::with_root("/nonexistent/hwmon", "coretemp");
        let snapshot = probe.sample(&Snapshot::new()).await.unwrap();
        assert_eq!(snapshot.get("cpu_temp_c"), Some(&MetricValue::Null));
    }

    #[test]
    fn test_garbage_sensor_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        chip(
            root.path(),
            "hwmon3",
            "coretemp",
            &[("temp1_input", "n/a"), ("temp2_input", "42000")],
        );
        assert_eq!(read_chip_temperatures(root.path(), "coretemp"), vec![42.0]);
    }
}
