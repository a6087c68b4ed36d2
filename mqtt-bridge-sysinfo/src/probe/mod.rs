//! Sensor probes.
//!
//! Each probe samples one data source and returns its contribution to the
//! cycle's [`Snapshot`]. Probes fail independently: an error only means that
//! probe's keys are missing from this cycle.

pub mod block_devices;
pub mod cpu_temp;
pub mod gpu;
pub mod memory;
pub mod mounts;

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use hostmetrics_common::Snapshot;

pub use block_devices::BlockDevicesProbe;
pub use cpu_temp::CpuTempProbe;
pub use gpu::GpuProbe;
pub use memory::MemoryProbe;
pub use mounts::MountsProbe;

/// Errors a probe can report.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} did not finish within {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("{tool} exited with {status}")]
    ExitStatus { tool: String, status: String },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("{0}")]
    Unavailable(String),
}

impl ProbeError {
    pub fn parse(what: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.to_string(),
        }
    }
}

/// A source of metrics sampled once per cycle.
#[async_trait]
pub trait Probe: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether failures are expected on ordinary hosts (logged at debug).
    fn optional(&self) -> bool {
        false
    }

    /// Sample the source.
    ///
    /// `prior` holds what earlier probes contributed this cycle. Merging is
    /// claim-based, so implementations do not need to consult it.
    async fn sample(&mut self, prior: &Snapshot) -> Result<Snapshot, ProbeError>;
}

/// An external command with a time limit.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    accepted_exit_codes: Vec<i32>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
            accepted_exit_codes: vec![0],
        }
    }

    /// Run `tool` through `sudo -n` so a missing sudoers rule fails instead of prompting.
    pub fn privileged(tool: &str, use_sudo: bool, timeout: Duration) -> Self {
        if use_sudo {
            Self::new("sudo", timeout).args(["-n", tool])
        } else {
            Self::new(tool, timeout)
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Exit codes treated as success (default: only 0).
    pub fn accept_exit_codes(mut self, codes: &[i32]) -> Self {
        self.accepted_exit_codes = codes.to_vec();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the command and return its stdout.
    ///
    /// The child is killed if the time limit expires.
    pub async fn run(&self) -> Result<Vec<u8>, ProbeError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ProbeError::Spawn {
                    tool: self.program.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(ProbeError::Timeout {
                    tool: self.program.clone(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        match output.status.code() {
            Some(code) if self.accepted_exit_codes.contains(&code) => Ok(output.stdout),
            _ => Err(ProbeError::ExitStatus {
                tool: self.program.clone(),
                status: output.status.to_string(),
            }),
        }
    }
}
