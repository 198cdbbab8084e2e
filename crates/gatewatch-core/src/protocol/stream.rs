use std::future::Future;

use super::{ProtocolError, TransportConfig};

/// Byte stream the AT engine talks over.
///
/// Reads are bounded: when nothing arrives within the configured read
/// timeout, `read` resolves to `Ok(0)` instead of blocking. Only the
/// [`LineReader`](super::LineReader) bound to a transport reads or writes it.
pub trait Transport: Send {
    /// Read whatever is available into `buf`; `Ok(0)` means the read timed out
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, ProtocolError>> + Send;

    /// Write `data`, returning how many bytes were accepted
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<usize, ProtocolError>> + Send;

    /// Release the underlying device
    fn close(&mut self) -> Result<(), ProtocolError>;
}

/// Opens transports for the supervisor, one per connection attempt
pub trait Connector: Send + Sync {
    /// Transport this connector opens
    type Transport: Transport;

    /// Open a fresh transport for `config`
    fn open(&self, config: &TransportConfig) -> Result<Self::Transport, ProtocolError>;
}
