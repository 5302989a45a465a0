//! Transport abstraction for the vehicle link, so the link manager can be
//! driven by a real serial port or by scripted mocks in tests

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::error::{GroundStationError, Result};
use crate::frame::protocol::{RawFrame, FRAME_SIZE};

/// Where the vehicle link lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Device identifier (e.g., /dev/ttyUSB0 or COM3)
    pub port: String,
    pub baud_rate: u32,
}

impl Endpoint {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.port, self.baud_rate)
    }
}

/// Byte I/O on an open link
#[async_trait]
pub trait LinkTransport: Send {
    /// Read whatever is available into `buf`, returning 0 on end of stream
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all data to the link
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Opens transports for an endpoint
#[async_trait]
pub trait LinkConnector: Send + Sync {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn LinkTransport>>;
}

/// Wrapper around tokio_serial::SerialStream that implements LinkTransport
pub struct SerialTransport {
    port: tokio_serial::SerialStream,
}

impl SerialTransport {
    pub fn new(port: tokio_serial::SerialStream) -> Self {
        Self { port }
    }
}

#[async_trait]
impl LinkTransport for SerialTransport {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        use tokio::io::AsyncReadExt;
        self.port.read(buf).await
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }
}

/// Opens serial ports with 8N1 framing and no flow control
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

#[async_trait]
impl LinkConnector for SerialConnector {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn LinkTransport>> {
        debug!("Trying to open serial port: {}", endpoint);

        let port = tokio_serial::new(&endpoint.port, endpoint.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| GroundStationError::TransportOpen {
                port: endpoint.port.clone(),
                reason: e.to_string(),
            })?;

        info!("Opened serial port {}", endpoint);
        Ok(Box::new(SerialTransport::new(port)))
    }
}

/// List serial devices present on this machine
pub fn available_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| GroundStationError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;

    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Read exactly one frame, reassembling fragments until `timeout` elapses
///
/// # Errors
///
/// - `FrameLength` if fewer than 24 bytes arrived before the deadline
///   (the partial bytes are discarded)
/// - `TransportRead` on an I/O error or end of stream
pub async fn read_frame(transport: &mut dyn LinkTransport, timeout: Duration) -> Result<RawFrame> {
    let deadline = Instant::now() + timeout;
    let mut frame = [0u8; FRAME_SIZE];
    let mut filled = 0;

    while filled < FRAME_SIZE {
        match timeout_at(deadline, transport.read(&mut frame[filled..])).await {
            Ok(Ok(0)) => {
                return Err(GroundStationError::TransportRead("link closed by device".to_string()));
            }
            Ok(Ok(n)) => filled += n,
            Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => {
                return Err(GroundStationError::FrameLength { actual: filled });
            }
            Ok(Err(e)) => return Err(GroundStationError::TransportRead(e.to_string())),
            Err(_) => return Err(GroundStationError::FrameLength { actual: filled }),
        }
    }

    Ok(frame)
}

/// Write one frame and flush it out
pub async fn send_frame(transport: &mut dyn LinkTransport, frame: &RawFrame) -> Result<()> {
    transport
        .write_all(frame)
        .await
        .map_err(|e| GroundStationError::TransportRead(format!("Failed to write frame: {}", e)))?;
    transport
        .flush()
        .await
        .map_err(|e| GroundStationError::TransportRead(format!("Failed to flush link: {}", e)))?;

    debug!("Sent frame ({} bytes)", frame.len());
    Ok(())
}
