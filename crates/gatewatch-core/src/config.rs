//! Agent configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! defaults for the detected [`Environment`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::environment::{Environment, MODEM_CONFIG_FILE};
use crate::modem::session::DEFAULT_CADENCE_MS;
use crate::modem::supervisor::DEFAULT_BACKOFF_MS;
use crate::modem::{DeviceWait, SessionSettings, SupervisorSettings};
use crate::protocol::{ExecutorSettings, TransportConfig, SETTLE_MS};

/// Interval settings, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Per-command timeout; unset picks 5s on the gateway, 60s elsewhere
    pub command_timeout_ms: Option<u64>,
    /// Pause between writing a command and reading its response
    pub settle_ms: u64,
    /// Time between session ticks
    pub cadence_ms: u64,
    /// Pause after a failed session before reconnecting
    pub backoff_ms: u64,
    /// How many times to look for the device node before opening anyway
    pub device_poll_attempts: u32,
    /// Pause between device node checks
    pub device_poll_interval_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        let wait = DeviceWait::default();
        Self {
            command_timeout_ms: None,
            settle_ms: SETTLE_MS,
            cadence_ms: DEFAULT_CADENCE_MS,
            backoff_ms: DEFAULT_BACKOFF_MS,
            device_poll_attempts: wait.attempts,
            device_poll_interval_ms: wait.interval.as_millis() as u64,
        }
    }
}

/// Top-level agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Serial line settings; an empty port picks the environment's default
    #[serde(default)]
    pub transport: TransportConfig,

    /// Intervals and timeouts
    #[serde(default)]
    pub timings: Timings,

    /// Dial-up configuration checked before using the modem
    #[serde(default = "default_modem_config_file")]
    pub modem_config_file: PathBuf,

    /// Capacity of the status channel
    #[serde(default = "default_status_channel_capacity")]
    pub status_channel_capacity: usize,
}

fn default_modem_config_file() -> PathBuf {
    PathBuf::from(MODEM_CONFIG_FILE)
}

fn default_status_channel_capacity() -> usize {
    1
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            timings: Timings::default(),
            modem_config_file: default_modem_config_file(),
            status_channel_capacity: default_status_channel_capacity(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Transport settings with the port resolved for `env`
    pub fn transport_config(&self, env: &Environment) -> TransportConfig {
        let mut transport = self.transport.clone();
        if transport.port_name.is_empty() {
            transport.port_name = env.modem_port().to_string();
        }
        transport
    }

    /// Everything the supervisor needs, resolved for `env`.
    ///
    /// Development hosts skip both the modem configuration probe and the
    /// wait for the device node.
    pub fn supervisor_settings(&self, env: &Environment) -> SupervisorSettings {
        let t = &self.timings;
        let command_timeout = t
            .command_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| env.command_timeout());

        SupervisorSettings {
            transport: self.transport_config(env),
            session: SessionSettings {
                executor: ExecutorSettings {
                    command_timeout,
                    settle: Duration::from_millis(t.settle_ms),
                },
                cadence: Duration::from_millis(t.cadence_ms),
            },
            backoff: Duration::from_millis(t.backoff_ms),
            modem_config_file: env
                .target_device
                .then(|| self.modem_config_file.clone()),
            device_wait: env.target_device.then_some(DeviceWait {
                attempts: t.device_poll_attempts,
                interval: Duration::from_millis(t.device_poll_interval_ms),
            }),
        }
    }

    /// Capacity clamped to what `tokio::sync::mpsc::channel` accepts
    pub fn channel_capacity(&self) -> usize {
        self.status_channel_capacity.max(1)
    }
}
