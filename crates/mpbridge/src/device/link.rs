//! Serial link
//!
//! Opens the display's serial port and runs two tasks over it: a writer fed
//! from a channel and a reader that hands every frame to the display
//! service's inbox.

use std::time::Duration;

use bus_runtime::{Event, ServiceInbox};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info};

use super::FRAME_TOPIC;
use super::codec::{DEFAULT_MAX_FRAME_LEN, FrameCodec};
use super::dispatcher::CommandSink;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("Invalid serial settings: {0}")]
    Settings(String),

    #[error("Serial link is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

/// Serial port settings, 9600 8N1 by default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub flow_control: FlowControl,
    /// Byte that ends every reply frame
    pub delimiter: char,
    pub max_frame_len: usize,
    /// Port read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::None,
            delimiter: 'x',
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            timeout_ms: 1000,
        }
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.port.is_empty() {
            return Err(TransportError::Settings("port must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(TransportError::Settings("baud_rate must be positive".into()));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(TransportError::Settings(format!(
                "data_bits must be 5-8, got {}",
                self.data_bits
            )));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(TransportError::Settings(format!(
                "stop_bits must be 1 or 2, got {}",
                self.stop_bits
            )));
        }
        if !self.delimiter.is_ascii() {
            return Err(TransportError::Settings(format!(
                "delimiter {:?} is not a single ASCII byte",
                self.delimiter
            )));
        }
        if self.max_frame_len == 0 {
            return Err(TransportError::Settings("max_frame_len must be positive".into()));
        }
        Ok(())
    }

    pub fn codec(&self) -> FrameCodec {
        FrameCodec::new(self.delimiter as u8, self.max_frame_len)
    }

    /// Open the port for async IO
    pub fn open(&self) -> Result<SerialStream, TransportError> {
        self.validate()?;

        let data_bits = match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };
        let stop_bits = match self.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };
        let parity = match self.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        };
        let flow_control = match self.flow_control {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        };

        let stream = tokio_serial::new(&self.port, self.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .flow_control(flow_control)
            .timeout(Duration::from_millis(self.timeout_ms))
            .open_native_async()?;

        info!(port = %self.port, baud = self.baud_rate, "Serial port opened");
        Ok(stream)
    }
}

/// Cloneable write handle. Lines queue without bound for the writer task,
/// which drains them as fast as the port accepts bytes.
#[derive(Clone)]
pub struct LinkWriter {
    tx: mpsc::UnboundedSender<String>,
}

impl CommandSink for LinkWriter {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.tx
            .send(line.to_string())
            .map_err(|_| TransportError::Closed)
    }
}

/// Reader and writer tasks over one serial stream
pub struct SerialLink {
    writer: LinkWriter,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl SerialLink {
    /// Start the link over `io`. Frames go to `frames` as `FRAME_TOPIC`
    /// events with `{"frame": "..."}` payloads; a full inbox pauses reading.
    pub fn spawn<T>(io: T, codec: FrameCodec, frames: ServiceInbox, source: String) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let (tx, rx) = mpsc::unbounded_channel();

        let reader_task = tokio::spawn(read_frames(
            FramedRead::new(read_half, codec.clone()),
            frames,
            source,
        ));
        let writer_task = tokio::spawn(write_lines(FramedWrite::new(write_half, codec), rx));

        Self {
            writer: LinkWriter { tx },
            reader_task,
            writer_task,
        }
    }

    pub fn writer(&self) -> LinkWriter {
        self.writer.clone()
    }

    /// Whether both tasks are still running
    pub fn is_open(&self) -> bool {
        !self.reader_task.is_finished() && !self.writer_task.is_finished()
    }

    pub fn close(self) {
        self.reader_task.abort();
        self.writer_task.abort();
        debug!("Serial link closed");
    }
}

async fn read_frames<R>(mut reader: FramedRead<R, FrameCodec>, inbox: ServiceInbox, source: String)
where
    R: AsyncRead + Unpin,
{
    while let Some(item) = reader.next().await {
        match item {
            Ok(frame) => {
                debug!(frame = %frame, "Frame received");
                let event = Event::new(FRAME_TOPIC, source.as_str(), serde_json::json!({ "frame": frame }));
                if inbox.deliver(event).await.is_err() {
                    debug!("Display service gone, serial reader stopping");
                    return;
                }
            }
            Err(e) => {
                error!(error = %e, "Serial read failed");
                break;
            }
        }
    }
    info!("Serial reader stopped");
}

async fn write_lines<W>(mut writer: FramedWrite<W, FrameCodec>, mut rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = writer.send(line).await {
            error!(error = %e, "Serial write failed");
            break;
        }
    }
    debug!("Serial writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus_runtime::ServiceCommand;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn inbox() -> (ServiceInbox, mpsc::Receiver<ServiceCommand>) {
        let (tx, rx) = mpsc::channel(16);
        (ServiceInbox::new(tx), rx)
    }

    async fn next_frame(rx: &mut mpsc::Receiver<ServiceCommand>) -> Event {
        match rx.recv().await {
            Some(ServiceCommand::Event(event)) => event,
            _ => panic!("expected a frame event"),
        }
    }

    #[test]
    fn test_default_settings_are_9600_8n1() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.delimiter, 'x');
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let bad = [
            SerialConfig { port: String::new(), ..Default::default() },
            SerialConfig { data_bits: 9, ..Default::default() },
            SerialConfig { stop_bits: 3, ..Default::default() },
            SerialConfig { delimiter: '°', ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(TransportError::Settings(_))));
        }
    }

    #[test]
    fn test_settings_from_json() {
        let config: SerialConfig =
            serde_json::from_value(serde_json::json!({ "port": "/dev/ttyS1", "parity": "even" })).unwrap();
        assert_eq!(config.port, "/dev/ttyS1");
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.baud_rate, 9600);
    }

    #[tokio::test]
    async fn test_link_round_trip() {
        let (device, mut display) = tokio::io::duplex(256);
        let (frames, mut rx) = inbox();
        let link = SerialLink::spawn(device, FrameCodec::default(), frames, "test".into());

        let mut writer = link.writer();
        writer.send_line("ka 01 01\r\n").unwrap();
        let mut buf = [0u8; 10];
        display.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ka 01 01\r\n");

        display.write_all(b"a 01 OK01x").await.unwrap();
        let event = next_frame(&mut rx).await;
        assert_eq!(event.topic, FRAME_TOPIC);
        assert_eq!(event.get_str("frame"), Some("a 01 OK01"));
        assert!(link.is_open());

        link.close();
    }

    #[tokio::test]
    async fn test_writer_reports_closed_link() {
        let (device, _display) = tokio::io::duplex(64);
        let (frames, _rx) = inbox();
        let link = SerialLink::spawn(device, FrameCodec::default(), frames, "test".into());
        let mut writer = link.writer();

        link.close();
        tokio::task::yield_now().await;
        // aborted tasks drop the receiver once they are polled to completion
        let mut result = writer.send_line("ka 01 01\r\n");
        for _ in 0..10 {
            if result.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            result = writer.send_line("ka 01 01\r\n");
        }
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_burst_larger_than_port_buffer_is_written_in_full() {
        let (device, mut display) = tokio::io::duplex(16);
        let (frames, _rx) = inbox();
        let link = SerialLink::spawn(device, FrameCodec::default(), frames, "test".into());
        let mut writer = link.writer();

        for _ in 0..100 {
            writer.send_line("dn 01 FF\r\n").unwrap();
        }

        let mut written = vec![0u8; 100 * 10];
        display.read_exact(&mut written).await.unwrap();
        assert_eq!(written, b"dn 01 FF\r\n".repeat(100));
        link.close();
    }

    #[tokio::test]
    async fn test_frames_wait_for_a_full_inbox() {
        let (device, mut display) = tokio::io::duplex(256);
        let (tx, mut rx) = mpsc::channel(1);
        let link = SerialLink::spawn(device, FrameCodec::default(), ServiceInbox::new(tx), "test".into());

        display.write_all(b"a 01 OK01xa 01 OK00xn 01 OK16x").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut frames = Vec::new();
        for _ in 0..3 {
            let event = next_frame(&mut rx).await;
            frames.push(event.get_str("frame").unwrap_or_default().to_string());
        }
        assert_eq!(frames, vec!["a 01 OK01", "a 01 OK00", "n 01 OK16"]);
        link.close();
    }
}
