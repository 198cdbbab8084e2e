//! Protocol errors

use std::fmt;
use thiserror::Error;

/// SIM lock state reported by `AT+CPIN?`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// State text the modem reported is not one we know
    Unknown,
    /// Waiting for the SIM PIN
    PinLocked,
    /// Waiting for the SIM PIN2
    Pin2Locked,
    /// Waiting for the SIM PUK
    PukLocked,
    /// Waiting for the SIM PUK2
    Puk2Locked,
}

impl fmt::Display for SimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SimState::Unknown => "unknown SIM state",
            SimState::PinLocked => "SIM PIN required",
            SimState::Pin2Locked => "SIM PIN2 required",
            SimState::PukLocked => "SIM PUK required",
            SimState::Puk2Locked => "SIM PUK2 required",
        };
        f.write_str(text)
    }
}

/// What the modem told us went wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimErrorKind {
    /// A classified SIM lock state
    State(SimState),
    /// Bare `ERROR` line; verbose error mode was not active
    Unspecified,
    /// Text of a `+CME ERROR: <text>` line, verbatim
    Reported(String),
}

/// Error reported by the modem itself.
///
/// These never indicate a broken link: the session keeps running and the
/// published status is degraded instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimError {
    kind: SimErrorKind,
}

impl SimError {
    /// Error for a classified SIM lock state
    pub fn from_state(state: SimState) -> Self {
        Self {
            kind: SimErrorKind::State(state),
        }
    }

    /// Error carrying the modem's own error text
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            kind: SimErrorKind::Reported(text.into()),
        }
    }

    /// Error for a bare `ERROR` line
    pub fn unspecified() -> Self {
        Self {
            kind: SimErrorKind::Unspecified,
        }
    }

    /// What the modem reported
    pub fn kind(&self) -> &SimErrorKind {
        &self.kind
    }

    /// SIM lock state, if this error carries one
    pub fn state(&self) -> Option<SimState> {
        match self.kind {
            SimErrorKind::State(state) => Some(state),
            _ => None,
        }
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SimErrorKind::State(state) => write!(f, "SIM error: {}", state),
            SimErrorKind::Unspecified => {
                f.write_str("unspecified error (enable verbose error mode for details)")
            }
            SimErrorKind::Reported(text) => write!(f, "modem error: {}", text),
        }
    }
}

impl std::error::Error for SimError {}

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Line settings the serial driver cannot use
    #[error("Invalid transport configuration: {0}")]
    Config(String),

    /// The serial device could not be opened or went away
    #[error("Serial device error: {0}")]
    Device(String),

    /// A single read produced nothing in time
    #[error("No data before read timeout")]
    Timeout,

    /// A whole command exchange exceeded the command timeout
    #[error("Command {command} did not complete in time")]
    CommandTimeout {
        /// Command text
        command: String,
    },

    /// The cancellation token fired
    #[error("Cancelled")]
    Cancelled,

    /// Error reported by the modem itself
    #[error(transparent)]
    Sim(#[from] SimError),

    /// A response did not have the expected shape
    #[error("Unexpected response to {command}: {message}")]
    Parse {
        /// Command text
        command: String,
        /// What was wrong with the response
        message: String,
    },

    /// The transport accepted only part of a command
    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes accepted
        written: usize,
        /// Bytes in the command
        expected: usize,
    },

    /// The transport was already closed
    #[error("Transport is closed")]
    Closed,

    /// Nobody receives status records anymore
    #[error("Status receiver has gone away")]
    ChannelClosed,

    /// Other I/O failure on the port
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// Modem-reported errors degrade the status; everything else ends the session.
    pub fn is_recoverable(&self) -> bool {
        self.as_sim_error().is_some()
    }

    /// The modem-reported error, if this is one
    pub fn as_sim_error(&self) -> Option<&SimError> {
        match self {
            ProtocolError::Sim(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn parse(command: &str, message: impl Into<String>) -> Self {
        ProtocolError::Parse {
            command: command.to_string(),
            message: message.into(),
        }
    }
}
