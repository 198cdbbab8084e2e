#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gatewatch_core::protocol::{Connector, ProtocolError, Transport, TransportConfig};

pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

pub const ICCID: &str = "8931087616027213997";

/// Frame response lines the way the modem does: `\r\n<line>\r\n`
pub fn framed(lines: &[&str]) -> Vec<u8> {
    lines
        .iter()
        .flat_map(|line| format!("\r\n{}\r\n", line).into_bytes())
        .collect()
}

/// Shared view of what a [`MockModem`] (and its clones) saw
#[derive(Clone, Default)]
pub struct Recorder {
    written: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.written().iter().filter(|c| *c == command).count()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Modem double: answers each written command from a script.
///
/// Commands without a scripted answer get silence; reads with nothing
/// pending wait out the read timeout and return `Ok(0)`.
#[derive(Clone)]
pub struct MockModem {
    responses: HashMap<String, Vec<u8>>,
    pending: VecDeque<Vec<u8>>,
    echo: bool,
    short_writes: bool,
    recorder: Recorder,
}

impl MockModem {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            pending: VecDeque::new(),
            echo: false,
            short_writes: false,
            recorder: Recorder::default(),
        }
    }

    /// Modem that answers every command the session issues
    pub fn healthy() -> Self {
        Self::new()
            .respond("AT", &["OK"])
            .respond("ATE0", &["OK"])
            .respond("AT+CMEE=2", &["OK"])
            .respond("AT+CPIN?", &["+CPIN: READY", "OK"])
            .respond("AT+CSQ", &["+CSQ: 20,99", "OK"])
            .respond("AT+CNSMOD?", &["+CNSMOD: 0,8", "OK"])
            .respond("AT+CCID", &[format!("+CCID: \"{}\"", ICCID).as_str(), "OK"])
    }

    pub fn respond(mut self, command: &str, lines: &[&str]) -> Self {
        self.responses.insert(command.to_string(), framed(lines));
        self
    }

    /// No answer at all to `command`
    pub fn silent(mut self, command: &str) -> Self {
        self.responses.remove(command);
        self
    }

    /// Bytes already waiting on the line before anything is written
    pub fn stale(mut self, data: &[u8]) -> Self {
        self.pending.push_back(data.to_vec());
        self
    }

    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Accept one byte less than asked on every write
    pub fn with_short_writes(mut self) -> Self {
        self.short_writes = true;
        self
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }
}

impl Transport for MockModem {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        let Some(mut chunk) = self.pending.pop_front() else {
            tokio::time::sleep(READ_TIMEOUT).await;
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.pending.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, ProtocolError> {
        let command = String::from_utf8_lossy(data).trim_end_matches('\r').to_string();
        self.recorder.written.lock().unwrap().push(command.clone());

        if self.echo {
            self.pending.push_back(format!("{}\r", command).into_bytes());
        }
        if let Some(response) = self.responses.get(&command) {
            self.pending.push_back(response.clone());
        }

        if self.short_writes {
            Ok(data.len().saturating_sub(1))
        } else {
            Ok(data.len())
        }
    }

    fn close(&mut self) -> Result<(), ProtocolError> {
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Transport replaying fixed read chunks; `None` is a read timeout
pub struct ChunkedTransport {
    chunks: VecDeque<Option<Vec<u8>>>,
}

impl ChunkedTransport {
    pub fn new(chunks: &[Option<&str>]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.map(|s| s.as_bytes().to_vec())).collect(),
        }
    }
}

impl Transport for ChunkedTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        match self.chunks.pop_front().flatten() {
            Some(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => Ok(0),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, ProtocolError> {
        Ok(data.len())
    }

    fn close(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

/// Hands out clones of a scripted modem, or fails every open when there is none
pub struct MockConnector {
    modem: Option<MockModem>,
    opens: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(modem: MockModem) -> Self {
        Self {
            modem: Some(modem),
            opens: Arc::default(),
        }
    }

    pub fn missing_device() -> Self {
        Self {
            modem: None,
            opens: Arc::default(),
        }
    }

    pub fn opens(&self) -> Arc<AtomicUsize> {
        self.opens.clone()
    }
}

impl Connector for MockConnector {
    type Transport = MockModem;

    fn open(&self, config: &TransportConfig) -> Result<MockModem, ProtocolError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match &self.modem {
            Some(modem) => Ok(modem.clone()),
            None => Err(ProtocolError::Device(format!(
                "could not open {}",
                config.port_name
            ))),
        }
    }
}
