//! NVIDIA GPU statistics via `nvidia-smi`.

use std::time::Duration;

use async_trait::async_trait;

use hostmetrics_common::{Snapshot, round_to};

use super::{Probe, ProbeError, ToolCommand};

/// Fields queried from nvidia-smi, in output order.
pub const QUERY: &str =
    "--query-gpu=index,temperature.gpu,utilization.gpu,memory.used,memory.total";

/// One GPU line from nvidia-smi. `None` marks a field the driver did not report.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuReading {
    pub index: usize,
    pub temp_c: Option<f64>,
    pub load_percent: Option<f64>,
    pub memory_used_mb: Option<f64>,
    pub memory_total_mb: Option<f64>,
}

impl GpuReading {
    /// Memory usage in percent; `None` if either figure is missing or total is 0.
    pub fn memory_percent(&self) -> Option<f64> {
        match (self.memory_used_mb, self.memory_total_mb) {
            (Some(used), Some(total)) if total > 0.0 => Some(round_to(used / total * 100.0, 1)),
            _ => None,
        }
    }

    fn write_to(&self, snapshot: &mut Snapshot) {
        let key = |suffix: &str| format!("gpu{}_{}", self.index, suffix);

        if let Some(temp) = self.temp_c {
            snapshot.insert(key("temp_c"), temp);
        }
        if let Some(load) = self.load_percent {
            snapshot.insert(key("load_percent"), round_to(load, 1));
        }
        if let Some(used) = self.memory_used_mb {
            snapshot.insert(key("memory_used_mb"), round_to(used, 1));
        }
        if let Some(total) = self.memory_total_mb {
            snapshot.insert(key("memory_total_mb"), round_to(total, 1));
        }
        if let Some(percent) = self.memory_percent() {
            snapshot.insert(key("memory_percent"), percent);
        }
    }
}

/// Parse `--format=csv,noheader,nounits` output.
pub fn parse_gpu_csv(text: &str) -> Result<Vec<GpuReading>, ProbeError> {
    let mut gpus = Vec::new();

    for (position, line) in text.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 5 {
            return Err(ProbeError::parse(
                "nvidia-smi output",
                format!("expected 5 fields, got {}: {:?}", fields.len(), line),
            ));
        }

        gpus.push(GpuReading {
            index: fields[0].parse().unwrap_or(position),
            temp_c: parse_field(fields[1]),
            load_percent: parse_field(fields[2]),
            memory_used_mb: parse_field(fields[3]),
            memory_total_mb: parse_field(fields[4]),
        });
    }

    Ok(gpus)
}

// "[N/A]" and "[Not Supported]" both fail to parse.
fn parse_field(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub struct GpuProbe {
    command: ToolCommand,
}

impl GpuProbe {
    pub fn new(program: &str, timeout: Duration) -> Self {
        Self {
            command: ToolCommand::new(program, timeout)
                .args([QUERY, "--format=csv,noheader,nounits"]),
        }
    }
}

#[async_trait]
impl Probe for GpuProbe {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn optional(&self) -> bool {
        true
    }

    async fn sample(&mut self, _prior: &Snapshot) -> Result<Snapshot, ProbeError> {
        let stdout = self.command.run().await?;
        let text = String::from_utf8_lossy(&stdout);

        let mut snapshot = Snapshot::new();
        for gpu in parse_gpu_csv(&text)? {
            gpu.write_to(&mut snapshot);
        }
        Ok(snapshot)
    }
}
