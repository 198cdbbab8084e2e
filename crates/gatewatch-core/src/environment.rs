//! Host environment probe

use std::time::Duration;

use crate::protocol::{DEFAULT_COMMAND_TIMEOUT_MS, DEV_COMMAND_TIMEOUT_MS};

/// Modem AT port on the gateway
pub const DEVICE_MODEM_PORT: &str = "/dev/ttyUSB3";

/// Stand-in port used on development hosts
pub const DEV_MODEM_PORT: &str = "COM10";

/// Dial-up configuration whose presence means a modem is fitted
pub const MODEM_CONFIG_FILE: &str = "/etc/wvdial.conf";

/// Set to run as a development host on a non-Windows machine
pub const DEV_HOST_VAR: &str = "GATEWATCH_DEV_HOST";

/// Facts about where the agent is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    /// Running on the gateway hardware itself
    pub target_device: bool,
    /// `DEBUG` is set
    pub debug: bool,
    /// `TRACE` is set
    pub trace: bool,
}

fn flag(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|v| !v.is_empty())
}

impl Environment {
    /// Probe the running host and its `DEBUG` / `TRACE` flags
    pub fn detect() -> Self {
        Self {
            target_device: !cfg!(windows) && !flag(DEV_HOST_VAR),
            debug: flag("DEBUG"),
            trace: flag("TRACE"),
        }
    }

    /// Environment for development hosts
    pub fn development() -> Self {
        Self {
            target_device: false,
            debug: false,
            trace: false,
        }
    }

    /// Default modem port for this host
    pub fn modem_port(&self) -> &'static str {
        if self.target_device {
            DEVICE_MODEM_PORT
        } else {
            DEV_MODEM_PORT
        }
    }

    /// Per-command timeout; development hosts get room for slow manual replies
    pub fn command_timeout(&self) -> Duration {
        if self.target_device {
            Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS)
        } else {
            Duration::from_millis(DEV_COMMAND_TIMEOUT_MS)
        }
    }

    /// Default log filter directive for these flags
    pub fn log_filter(&self) -> &'static str {
        if self.trace {
            "trace"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
