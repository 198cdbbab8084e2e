//! Modem supervisor
//!
//! Owns the transport lifecycle: probe for a modem configuration, wait for
//! the device node, open, run a [`Session`], close, back off and retry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::protocol::{Connector, ProtocolError, Transport, TransportConfig};

use super::session::{Session, SessionError, SessionSettings};
use super::ModemStatusMessage;

/// Pause after a failed session in milliseconds
pub const DEFAULT_BACKOFF_MS: u64 = 30_000;

/// How long to wait for the device node to show up after boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceWait {
    /// Checks before giving up and opening anyway
    pub attempts: u32,
    /// Pause between checks
    pub interval: Duration,
}

impl Default for DeviceWait {
    fn default() -> Self {
        // 10 x 5s covers the slowest modem enumeration seen after boot
        Self {
            attempts: 10,
            interval: Duration::from_secs(5),
        }
    }
}

/// Everything a [`Supervisor`] needs to know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Port to open for each session
    pub transport: TransportConfig,
    /// Timing inside a session
    pub session: SessionSettings,
    /// Pause after a failed session
    pub backoff: Duration,
    /// Dial-up configuration that must exist before the modem is used;
    /// `None` skips the check
    pub modem_config_file: Option<PathBuf>,
    /// `None` opens the port straight away
    pub device_wait: Option<DeviceWait>,
}

impl SupervisorSettings {
    /// Defaults for `transport`, with both pre-flight checks skipped
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            session: SessionSettings::default(),
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            modem_config_file: None,
            device_wait: None,
        }
    }
}

/// Keeps a modem session running until cancelled
pub struct Supervisor<C: Connector> {
    connector: C,
    settings: SupervisorSettings,
    status_tx: mpsc::Sender<ModemStatusMessage>,
    cancel: CancellationToken,
}

impl<C: Connector> Supervisor<C> {
    /// Supervisor opening ports through `connector`
    pub fn new(
        connector: C,
        settings: SupervisorSettings,
        status_tx: mpsc::Sender<ModemStatusMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connector,
            settings,
            status_tx,
            cancel,
        }
    }

    /// Run on a dedicated task
    pub fn spawn(self) -> JoinHandle<()>
    where
        C: 'static,
        C::Transport: Sync,
    {
        tokio::spawn(async move { self.run().await })
    }

    /// Supervise until cancelled or until nobody listens for status anymore
    pub async fn run(&self) {
        let backoff = self.settings.backoff;

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            if !self.modem_config_available().await {
                debug!("No modem configuration available, waiting {:?}", backoff);
                if self.publish(ModemStatusMessage::unconfigured()).await.is_err() {
                    return;
                }
                if !self.pause(backoff).await {
                    return;
                }
                continue;
            }

            self.wait_for_device().await;
            if self.cancel.is_cancelled() {
                return;
            }

            match self.attempt().await {
                Ok(()) => {
                    debug!("Modem supervisor stopped");
                    return;
                }
                Err(e) if matches!(e.source, ProtocolError::ChannelClosed) => {
                    warn!("Status receiver dropped, stopping modem supervisor");
                    return;
                }
                Err(e) => {
                    error!("Modem error: {}", e);
                    if self.publish(ModemStatusMessage::unavailable()).await.is_err() {
                        return;
                    }
                    debug!("Waiting: {:?} before retrying to connect", backoff);
                    if !self.pause(backoff).await {
                        return;
                    }
                }
            }
        }
    }

    /// One open → session → close cycle. The transport is closed on every
    /// path out of here once it has been opened.
    async fn attempt(&self) -> Result<(), SessionError> {
        let config = &self.settings.transport;
        let mut transport = self
            .connector
            .open(config)
            .map_err(|source| SessionError { command: "open", source })?;

        debug!(
            "Successfully opened modem port: {} with baudrate: {} and command timeout of: {:?}",
            config.port_name, config.baud_rate, self.settings.session.executor.command_timeout
        );

        let result = Session::new(
            &mut transport,
            self.settings.session,
            &self.status_tx,
            self.cancel.clone(),
        )
        .run()
        .await;

        match transport.close() {
            Ok(()) => debug!("Successfully closed modem port: {}", config.port_name),
            Err(e) => warn!("Could not close serial port reason: {}", e),
        }

        result
    }

    async fn modem_config_available(&self) -> bool {
        match &self.settings.modem_config_file {
            Some(path) => path_exists(path).await,
            None => true,
        }
    }

    /// Give the device node a chance to appear before reporting it missing
    async fn wait_for_device(&self) {
        let Some(wait) = self.settings.device_wait else {
            debug!("Skipped pre-flight modem check");
            return;
        };
        let device = Path::new(&self.settings.transport.port_name);

        for _ in 0..wait.attempts {
            if path_exists(device).await {
                return;
            }
            if !self.pause(wait.interval).await {
                return;
            }
        }

        warn!(
            "Modem pre-flight check failed after {} attempts",
            wait.attempts
        );
    }

    async fn publish(&self, status: ModemStatusMessage) -> Result<(), ProtocolError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProtocolError::Cancelled),
            sent = self.status_tx.send(status) => sent.map_err(|_| ProtocolError::ChannelClosed),
        }
    }

    /// Sleep for `duration`; `false` when cancelled first
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
