//! Serial port handling
//!
//! Provides the transport configuration and the tokio-serial backed
//! [`Transport`] used to talk to the modem.

use serde::{Deserialize, Serialize};
use serialport::{SerialPortInfo, SerialPortType};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

use super::{Connector, ProtocolError, Transport, DEFAULT_BAUD_RATE};

/// Default number of data bits
pub const DEFAULT_DATA_BITS: u8 = 8;

/// Default read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 500;

/// Shortest read timeout the line discipline can express (1 decisecond)
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Longest read timeout the line discipline can express (255 deciseconds)
const MAX_READ_TIMEOUT: Duration = Duration::from_millis(25_500);

/// Parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
    /// Parity bit always 1
    Mark,
    /// Parity bit always 0
    Space,
}

/// Stop bit setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopBits {
    /// One stop bit
    #[default]
    #[serde(rename = "1")]
    One,
    /// One and a half stop bits
    #[serde(rename = "1.5")]
    OneAndHalf,
    /// Two stop bits
    #[serde(rename = "2")]
    Two,
}

/// Serial line settings for the modem port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Device path (e.g. "/dev/ttyUSB3" or "COM10"); empty selects the
    /// environment's default
    pub port_name: String,
    /// Line speed in bits per second
    pub baud_rate: u32,
    /// Data bits per character, 5 to 8
    pub data_bits: u8,
    /// Parity; mark and space are not supported
    pub parity: Parity,
    /// Stop bits; 1.5 is not supported
    pub stop_bits: StopBits,
    /// Read timeout in milliseconds; 0 selects the default
    pub read_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DEFAULT_DATA_BITS,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

/// Line settings after validation, in tokio-serial's vocabulary
#[derive(Debug, Clone, Copy)]
pub struct LineSettings {
    /// Line speed in bits per second
    pub baud_rate: u32,
    /// Data bits per character
    pub data_bits: tokio_serial::DataBits,
    /// Parity
    pub parity: tokio_serial::Parity,
    /// Stop bits
    pub stop_bits: tokio_serial::StopBits,
    /// Clamped read timeout
    pub read_timeout: Duration,
}

impl TransportConfig {
    /// Config for `port_name` with default line settings
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Effective read timeout, clamped to the 0.1s..25.5s range
    pub fn read_timeout(&self) -> Duration {
        if self.read_timeout_ms == 0 {
            return Duration::from_millis(DEFAULT_READ_TIMEOUT_MS);
        }
        Duration::from_millis(self.read_timeout_ms).clamp(MIN_READ_TIMEOUT, MAX_READ_TIMEOUT)
    }

    /// Check every setting against what the serial driver supports
    pub fn validate(&self) -> Result<LineSettings, ProtocolError> {
        if self.port_name.is_empty() {
            return Err(ProtocolError::Config("no serial port configured".into()));
        }
        if self.baud_rate == 0 {
            return Err(ProtocolError::Config("baud rate must be non-zero".into()));
        }

        let data_bits = match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            8 => tokio_serial::DataBits::Eight,
            other => {
                return Err(ProtocolError::Config(format!(
                    "unsupported serial data size: {}",
                    other
                )))
            }
        };

        let parity = match self.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
            other => {
                return Err(ProtocolError::Config(format!(
                    "unsupported parity setting: {:?}",
                    other
                )))
            }
        };

        let stop_bits = match self.stop_bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
            StopBits::OneAndHalf => {
                return Err(ProtocolError::Config(
                    "unsupported stop bit setting: 1.5".into(),
                ))
            }
        };

        Ok(LineSettings {
            baud_rate: self.baud_rate,
            data_bits,
            parity,
            stop_bits,
            read_timeout: self.read_timeout(),
        })
    }
}

/// Modem port backed by a tokio-serial stream
pub struct SerialTransport {
    name: String,
    stream: Option<SerialStream>,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Validate `config` and open the port
    pub fn open(config: &TransportConfig) -> Result<Self, ProtocolError> {
        let settings = config.validate()?;

        let stream = tokio_serial::new(&config.port_name, settings.baud_rate)
            .data_bits(settings.data_bits)
            .parity(settings.parity)
            .stop_bits(settings.stop_bits)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(settings.read_timeout)
            .open_native_async()
            .map_err(|e| {
                debug!(
                    port = %config.port_name,
                    candidates = ?list_port_names(),
                    "could not open serial port"
                );
                ProtocolError::Device(format!("{}: {}", config.port_name, e))
            })?;

        Ok(Self {
            name: config.port_name.clone(),
            stream: Some(stream),
            read_timeout: settings.read_timeout,
        })
    }
}

impl Transport for SerialTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        let stream = self.stream.as_mut().ok_or(ProtocolError::Closed)?;
        match tokio::time::timeout(self.read_timeout, stream.read(buf)).await {
            Err(_) => Ok(0),
            Ok(Ok(0)) if !buf.is_empty() => Err(ProtocolError::Device(format!(
                "{}: device closed the stream",
                self.name
            ))),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e))
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(0)
            }
            Ok(Err(e)) => Err(ProtocolError::IoError(e)),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, ProtocolError> {
        let stream = self.stream.as_mut().ok_or(ProtocolError::Closed)?;
        Ok(stream.write(data).await?)
    }

    fn close(&mut self) -> Result<(), ProtocolError> {
        match self.stream.take() {
            Some(stream) => {
                drop(stream);
                Ok(())
            }
            None => Err(ProtocolError::Closed),
        }
    }
}

/// Opens [`SerialTransport`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    type Transport = SerialTransport;

    fn open(&self, config: &TransportConfig) -> Result<SerialTransport, ProtocolError> {
        SerialTransport::open(config)
    }
}

/// Helper used to sort port names so that:
///  - ttyUSB* ports come first (sorted numerically by suffix)
///  - then ttyACM* ports (sorted numerically)
///  - then other ports (sorted by name)
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

fn describe(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "{} ({:04x}:{:04x})",
            info.port_name, usb.vid, usb.pid
        ),
        _ => info.port_name.clone(),
    }
}

/// Serial ports present on this host, modem candidates first
pub fn list_port_names() -> Vec<String> {
    let mut ports = serialport::available_ports().unwrap_or_default();
    ports.sort_by_key(|p| port_sort_key(&p.port_name));
    ports.iter().map(describe).collect()
}
