//! Cellular modem monitoring
//!
//! The AT command library, signal translation, and the session/supervisor
//! pair that keep the modem polled and its status published.

pub mod commands;
pub mod session;
mod signal;
mod status;
pub mod supervisor;

pub use commands::CsqResult;
pub use session::{Session, SessionError, SessionSettings};
pub use signal::{translate_signal, SignalStrength, BER_UNKNOWN};
pub use status::{ModemStatusMessage, NetworkType};
pub use supervisor::{DeviceWait, Supervisor, SupervisorSettings};
