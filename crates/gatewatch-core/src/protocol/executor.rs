//! Command execution
//!
//! Runs one AT command at a time over a [`LineReader`]: write, settle, then
//! feed response lines to the command's handler until it finishes.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{LineReader, ProtocolError, Reply, Transport, DEFAULT_COMMAND_TIMEOUT_MS, SETTLE_MS};

/// Terminator appended to every command
const COMMAND_TERMINATOR: u8 = b'\r';

type Handler<'a> = Box<dyn FnMut(&str) -> Reply + Send + 'a>;

/// One AT command and the handler that interprets its response
pub struct Command<'a> {
    text: String,
    handler: Handler<'a>,
    drain_first: bool,
}

impl<'a> Command<'a> {
    /// Command `text` whose response goes to `handler`
    pub fn new(text: impl Into<String>, handler: impl FnMut(&str) -> Reply + Send + 'a) -> Self {
        Self {
            text: text.into(),
            handler: Box::new(handler),
            drain_first: false,
        }
    }

    /// Discard stale modem output before sending this command
    pub fn draining(mut self) -> Self {
        self.drain_first = true;
        self
    }

    /// Command text without the terminator
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Command bytes as sent on the wire
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.text.as_bytes().to_vec();
        bytes.push(COMMAND_TERMINATOR);
        bytes
    }
}

/// Timing knobs for command execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Upper bound for a whole command exchange
    pub command_timeout: Duration,
    /// Pause between writing a command and reading its response
    pub settle: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            settle: Duration::from_millis(SETTLE_MS),
        }
    }
}

/// Executes commands strictly one after another over a single link
pub struct Executor<'a, T: Transport> {
    reader: LineReader<'a, T>,
    settings: ExecutorSettings,
    cancel: CancellationToken,
}

impl<'a, T: Transport> Executor<'a, T> {
    /// Executor owning the only reader of `transport`
    pub fn new(
        transport: &'a mut T,
        settings: ExecutorSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            reader: LineReader::new(transport),
            settings,
            cancel,
        }
    }

    /// Run `command` to completion.
    ///
    /// A modem-reported error comes back as [`ProtocolError::Sim`]; a modem
    /// that never finishes answering within the command timeout gives
    /// [`ProtocolError::CommandTimeout`]; cancellation gives
    /// [`ProtocolError::Cancelled`].
    pub async fn execute(&mut self, mut command: Command<'_>) -> Result<(), ProtocolError> {
        let cancel = self.cancel.clone();
        let timeout = self.settings.command_timeout;
        let name = command.text.clone();

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Cancelled {} before it completed", name);
                Err(ProtocolError::Cancelled)
            }
            result = tokio::time::timeout(timeout, self.exchange(&mut command)) => match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    debug!("Timing failure in command: {}", name);
                    Err(ProtocolError::CommandTimeout { command: name })
                }
            },
        }
    }

    /// Discard whatever the modem has queued up
    pub async fn drain(&mut self) -> Result<usize, ProtocolError> {
        let cancel = self.cancel.clone();
        let timeout = self.settings.command_timeout;

        tokio::select! {
            _ = cancel.cancelled() => Err(ProtocolError::Cancelled),
            result = tokio::time::timeout(timeout, self.reader.drain()) => {
                result.map_err(|_| ProtocolError::CommandTimeout { command: "drain".into() })?
            }
        }
    }

    async fn exchange(&mut self, command: &mut Command<'_>) -> Result<(), ProtocolError> {
        if command.drain_first {
            self.reader.drain().await?;
        }

        let bytes = command.to_bytes();
        trace!(target: "gatewatch::at", ">> {}", command.text);
        let written = self.reader.write(&bytes).await?;
        if written != bytes.len() {
            return Err(ProtocolError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }

        tokio::time::sleep(self.settings.settle).await;

        loop {
            let line = match self.reader.read_line().await {
                Ok(line) => line,
                // Modem silent so far; the command timeout bounds the wait
                Err(ProtocolError::Timeout) => continue,
                Err(e) => return Err(e),
            };
            trace!(target: "gatewatch::at", "<< {}", line);

            match (command.handler)(&line) {
                Reply::NeedMore => continue,
                Reply::Done => return Ok(()),
                Reply::Failed(err) => return Err(err.into()),
            }
        }
    }
}
