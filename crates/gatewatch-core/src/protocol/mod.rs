//! Serial Protocol Communication
//!
//! Implements the half-duplex AT command protocol spoken by the cellular
//! modem: one command in flight, responses read line by line.

mod error;
pub mod executor;
pub mod handler;
mod reader;
pub mod serial;
mod stream;

pub use error::{ProtocolError, SimError, SimErrorKind, SimState};
pub use executor::{Command, Executor, ExecutorSettings};
pub use handler::{classify_error, default_handler, pin_handler, prefix_handler, Reply};
pub use reader::{LineReader, LINE_TERMINATOR, MAX_LINE_LENGTH};
pub use serial::{
    list_port_names, Parity, SerialConnector, SerialTransport, StopBits, TransportConfig,
};
pub use stream::{Connector, Transport};

/// Default baud rate for the modem port
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Per-command timeout on target hardware in milliseconds
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;

/// Per-command timeout on development hosts, where a person may be typing
/// the modem's side by hand
pub const DEV_COMMAND_TIMEOUT_MS: u64 = 60_000;

/// Pause between writing a command and reading its response in milliseconds
pub const SETTLE_MS: u64 = 500;
