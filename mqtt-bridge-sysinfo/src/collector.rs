//! Snapshot assembly.

use std::time::Duration;

use hostmetrics_common::Snapshot;

use crate::config::SysinfoConfig;
use crate::probe::{
    BlockDevicesProbe, CpuTempProbe, GpuProbe, MemoryProbe, MountsProbe, Probe,
};

/// Runs the configured probes and merges their output into one snapshot.
pub struct SnapshotAssembler {
    probes: Vec<Box<dyn Probe>>,
}

impl SnapshotAssembler {
    /// Create an assembler that runs `probes` in order.
    pub fn new(probes: Vec<Box<dyn Probe>>) -> Self {
        Self { probes }
    }

    /// Probes enabled in `config`, in the order cpu_temp, gpu, memory,
    /// mounts, block_devices.
    pub fn from_config(config: &SysinfoConfig) -> Self {
        let collect = &config.collect;
        let tools = &config.tools;
        let mut probes: Vec<Box<dyn Probe>> = Vec::new();

        if collect.cpu_temp {
            probes.push(Box::new(CpuTempProbe::new(config.cpu.chip.clone())));
        }
        if collect.gpu {
            probes.push(Box::new(GpuProbe::new(
                &tools.nvidia_smi,
                Duration::from_secs(tools.gpu_timeout_secs),
            )));
        }
        if collect.memory {
            probes.push(Box::new(MemoryProbe::new()));
        }
        if collect.disks {
            probes.push(Box::new(MountsProbe::new(config.disk.clone())));
        }
        if collect.block_devices {
            probes.push(Box::new(BlockDevicesProbe::new(tools)));
        }

        Self::new(probes)
    }

    pub fn probe_names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Build this cycle's snapshot.
    ///
    /// Starts empty every time. A failing probe is logged and contributes
    /// nothing; the others are unaffected.
    pub async fn assemble(&mut self) -> Snapshot {
        let mut snapshot = Snapshot::new();

        for probe in self.probes.iter_mut() {
            let result = probe.sample(&snapshot).await;
            match result {
                Ok(part) => {
                    tracing::trace!(probe = probe.name(), metrics = part.len(), "Probe sampled");
                    snapshot.merge(part);
                }
                Err(e) if probe.optional() => {
                    tracing::debug!(probe = probe.name(), error = %e, "Probe unavailable");
                }
                Err(e) => {
                    tracing::warn!(probe = probe.name(), error = %e, "Probe failed");
                }
            }
        }

        snapshot
    }
}
