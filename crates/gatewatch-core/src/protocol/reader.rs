//! Line-oriented reads over a [`Transport`]

use tracing::{debug, warn};

use super::{ProtocolError, Transport};

/// Byte that terminates a modem response line
pub const LINE_TERMINATOR: u8 = b'\r';

/// Longest unterminated run kept while waiting for a terminator
pub const MAX_LINE_LENGTH: usize = 4096;

const CHUNK_SIZE: usize = 256;

/// Buffers a transport and hands out one terminated line at a time.
///
/// Bytes read before a timeout stay buffered, so a line that arrives in
/// several chunks (or straddles a read timeout) is still returned whole.
pub struct LineReader<'a, T: Transport> {
    transport: &'a mut T,
    buffer: Vec<u8>,
    terminator: u8,
}

impl<'a, T: Transport> LineReader<'a, T> {
    /// Reader splitting on [`LINE_TERMINATOR`]
    pub fn new(transport: &'a mut T) -> Self {
        Self::with_terminator(transport, LINE_TERMINATOR)
    }

    /// Reader splitting on `terminator`
    pub fn with_terminator(transport: &'a mut T, terminator: u8) -> Self {
        Self {
            transport,
            buffer: Vec::with_capacity(CHUNK_SIZE),
            terminator,
        }
    }

    /// Read the next line, trimmed of surrounding whitespace.
    ///
    /// Returns [`ProtocolError::Timeout`] when the transport times out before
    /// a terminator arrives.
    pub async fn read_line(&mut self) -> Result<String, ProtocolError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == self.terminator) {
                let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
                return Ok(String::from_utf8_lossy(&raw).trim().to_string());
            }

            let mut chunk = [0u8; CHUNK_SIZE];
            let n = self.transport.read(&mut chunk).await?;
            if n == 0 {
                return Err(ProtocolError::Timeout);
            }
            self.buffer.extend_from_slice(&chunk[..n]);

            // Wrong baud rate or line noise: nothing sensible will terminate this
            if self.buffer.len() > MAX_LINE_LENGTH && !self.buffer.contains(&self.terminator) {
                warn!(
                    "Discarding {} bytes received without a line terminator",
                    self.buffer.len()
                );
                self.buffer.clear();
            }
        }
    }

    /// Discard lines until the modem goes quiet, returning how many were dropped
    pub async fn drain(&mut self) -> Result<usize, ProtocolError> {
        let mut drained = 0;
        loop {
            match self.read_line().await {
                Ok(line) => {
                    if !line.is_empty() {
                        debug!("Drained stale line from serial port: {:?}", line);
                    }
                    drained += 1;
                }
                Err(ProtocolError::Timeout) => {
                    if !self.buffer.is_empty() {
                        debug!(
                            "Drained {} unterminated bytes from serial port",
                            self.buffer.len()
                        );
                        self.buffer.clear();
                    }
                    return Ok(drained);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Write raw bytes to the underlying transport
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, ProtocolError> {
        self.transport.write(data).await
    }
}
