//! # Gatewatch Core Library
//!
//! Core functionality for the gatewatch gateway monitoring agent.

//!
//! This library provides:
//! - A serial transport with bounded-wait reads
//! - The half-duplex AT command engine (line reader, executor, handlers)
//! - The modem command library and signal classification
//! - A session loop and reconnecting supervisor publishing modem status
//!
//! ## Example
//!
//! ```rust,ignore
//! use gatewatch_core::{config::AgentConfig, environment::Environment};
//! use gatewatch_core::modem::Supervisor;
//! use gatewatch_core::protocol::SerialConnector;
//! use tokio_util::sync::CancellationToken;
//!
//! let env = Environment::detect();
//! let settings = AgentConfig::default().supervisor_settings(&env);
//! let (tx, mut rx) = tokio::sync::mpsc::channel(1);
//! let cancel = CancellationToken::new();
//!
//! Supervisor::new(SerialConnector, settings, tx, cancel.clone()).spawn();
//! while let Some(status) = rx.recv().await {
//!     println!("modem available: {}", status.modem_available);
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

pub mod config;
pub mod environment;
pub mod modem;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AgentConfig, Timings};
    pub use crate::environment::Environment;
    pub use crate::modem::{
        ModemStatusMessage, NetworkType, SignalStrength, Supervisor, SupervisorSettings,
    };
    pub use crate::protocol::{
        Connector, ProtocolError, SerialConnector, SimError, Transport, TransportConfig,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
