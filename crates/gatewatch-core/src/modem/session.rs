//! Modem session
//!
//! Polls the modem on a fixed cadence over one open transport and publishes
//! a [`ModemStatusMessage`] per tick.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::{Executor, ExecutorSettings, ProtocolError, SimError, Transport};

use super::commands::{self, CMEE_VERBOSE};
use super::{translate_signal, ModemStatusMessage, SignalStrength};

/// Time between ticks in milliseconds
pub const DEFAULT_CADENCE_MS: u64 = 5_000;

/// A failure that ends the session, tagged with the command that caused it
#[derive(Error, Debug)]
#[error("{command} failed: {source}")]
pub struct SessionError {
    /// Command (or session step) that failed
    pub command: &'static str,
    /// What went wrong
    pub source: ProtocolError,
}

impl SessionError {
    fn new(command: &'static str, source: ProtocolError) -> Self {
        Self { command, source }
    }

    /// The session stopped because it was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, ProtocolError::Cancelled)
    }
}

/// Timing for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Per-command timing
    pub executor: ExecutorSettings,
    /// Time between ticks
    pub cadence: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            executor: ExecutorSettings::default(),
            cadence: Duration::from_millis(DEFAULT_CADENCE_MS),
        }
    }
}

/// Separate modem-reported errors (returned as `Ok(Err(_))`) from errors
/// that end the session.
fn check<V>(
    command: &'static str,
    result: Result<V, ProtocolError>,
) -> Result<Result<V, SimError>, SessionError> {
    let source = match result {
        Ok(value) => return Ok(Ok(value)),
        Err(source) => source,
    };
    if let Some(err) = source.as_sim_error() {
        debug!("Ignoring error: {} in command: {}", err, command);
        return Ok(Err(err.clone()));
    }
    Err(SessionError::new(command, source))
}

/// Commands whose failure is only worth a warning
fn best_effort(
    command: &'static str,
    result: Result<(), ProtocolError>,
) -> Result<(), SessionError> {
    match result {
        Err(ProtocolError::Cancelled) => {
            Err(SessionError::new(command, ProtocolError::Cancelled))
        }
        Err(e) if e.is_recoverable() => {
            debug!("{} rejected by modem: {}", command, e);
            Ok(())
        }
        Err(e) => {
            warn!("{} failed: {}", command, e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

/// One modem session over an open transport
pub struct Session<'a, T: Transport> {
    executor: Executor<'a, T>,
    cadence: Duration,
    status_tx: &'a mpsc::Sender<ModemStatusMessage>,
    cancel: CancellationToken,
    verbose_errors_requested: bool,
}

impl<'a, T: Transport> Session<'a, T> {
    /// Session over `transport`, publishing to `status_tx`
    pub fn new(
        transport: &'a mut T,
        settings: SessionSettings,
        status_tx: &'a mpsc::Sender<ModemStatusMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            executor: Executor::new(transport, settings.executor, cancel.clone()),
            cadence: settings.cadence,
            status_tx,
            cancel,
            verbose_errors_requested: false,
        }
    }

    /// Poll until cancelled (`Ok`) or until a command fails in a way the
    /// session cannot absorb (`Err`).
    pub async fn run(&mut self) -> Result<(), SessionError> {
        match self.run_ticks().await {
            Err(e) if e.is_cancelled() => {
                debug!("Cancelled modem command handling");
                Ok(())
            }
            other => other,
        }
    }

    async fn run_ticks(&mut self) -> Result<(), SessionError> {
        self.executor
            .drain()
            .await
            .map_err(|e| SessionError::new("drain", e))?;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.cadence) => {}
            }

            debug!("Trying to fetch modem data");
            let status = self.tick().await?;
            self.publish(status).await?;
        }
    }

    /// Run the full command sequence once and build the resulting status
    pub async fn tick(&mut self) -> Result<ModemStatusMessage, SessionError> {
        let mut status = ModemStatusMessage {
            config_available: true,
            modem_available: true,
            sim_ready: true,
            ..ModemStatusMessage::default()
        };

        if check("AT", commands::at(&mut self.executor).await)?.is_err() {
            status.modem_available = false;
        }

        best_effort("ATE", commands::ate(&mut self.executor, false).await)?;

        if !self.verbose_errors_requested {
            self.verbose_errors_requested = true;
            best_effort("AT+CMEE", commands::cmee(&mut self.executor, CMEE_VERBOSE).await)?;
        }

        if check("AT+CPIN?", commands::cpin(&mut self.executor).await)?.is_err() {
            status.sim_ready = false;
        }

        status.signal = match check("AT+CSQ", commands::csq(&mut self.executor).await)? {
            Ok(csq) => translate_signal(csq.rssi, csq.ber),
            Err(_) => SignalStrength::NoSignal,
        };

        status.network = check("AT+CNSMOD?", commands::cnsmod(&mut self.executor).await)?
            .unwrap_or_default();

        status.sim_id = check("AT+CCID", commands::ccid(&mut self.executor).await)?
            .unwrap_or_default();

        Ok(status)
    }

    async fn publish(&self, status: ModemStatusMessage) -> Result<(), SessionError> {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                Err(SessionError::new("publish", ProtocolError::Cancelled))
            }
            sent = self.status_tx.send(status) => {
                sent.map_err(|_| SessionError::new("publish", ProtocolError::ChannelClosed))
            }
        }
    }
}
