// src/hardware/serial.rs - Serial link to the motor controller
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serial2_tokio::SerialPort;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::config::SerialConfig;
use crate::hardware::{HardwareError, LinkStats, MotorLink, format_motor_command};
use crate::motion::kinematics::MotorCommand;

/// Unterminated response text kept before it is discarded.
const MAX_PENDING_RESPONSE: usize = 1024;

/// Serial link statistics
#[derive(Debug, Default)]
struct SerialStats {
    commands_sent: AtomicU64,
    bytes_written: AtomicU64,
    lines_received: AtomicU64,
    dropped: AtomicU64,
}

impl SerialStats {
    fn snapshot(&self) -> LinkStats {
        LinkStats {
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_dropped: self.dropped.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
        }
    }
}

/// Motor link over a serial port.
///
/// `send` only queues the encoded line; a background task owns the actual
/// write. Any write error or timeout marks the link disconnected and the
/// writer exits. Reconnecting means opening a new link.
pub struct SerialMotorLink {
    command_tx: mpsc::Sender<String>,
    connected: Arc<AtomicBool>,
    stats: Arc<SerialStats>,
    port_name: String,
}

impl SerialMotorLink {
    /// Open the port and start the writer and reader tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &SerialConfig) -> Result<Self, HardwareError> {
        tracing::info!("Connecting to motor controller on {} at {} baud", config.port, config.baud);

        let open_error = |source| HardwareError::Open {
            port: config.port.clone(),
            source,
        };
        let read_port = SerialPort::open(&config.port, config.baud).map_err(open_error)?;
        let write_port = read_port.try_clone().map_err(open_error)?;

        let link = Self::with_io(write_port, read_port, config.port.clone(), config);
        tracing::info!("Connected to motor controller");
        Ok(link)
    }

    /// Start the writer and reader tasks over an already open byte stream.
    fn with_io<W, R>(writer: W, reader: R, port_name: String, config: &SerialConfig) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<String>(config.queue_depth.max(1));
        let connected = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(SerialStats::default());

        tokio::spawn(writer_task(
            writer,
            command_rx,
            connected.clone(),
            stats.clone(),
            config.write_timeout_duration(),
        ));
        tokio::spawn(reader_task(
            reader,
            connected.clone(),
            stats.clone(),
            config.read_timeout_duration(),
        ));

        Self {
            command_tx,
            connected,
            stats,
            port_name,
        }
    }
}

impl MotorLink for SerialMotorLink {
    fn send(&mut self, command: &MotorCommand) -> Result<(), HardwareError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(HardwareError::Disconnected);
        }
        match self.command_tx.try_send(format_motor_command(command)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(HardwareError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.connected.store(false, Ordering::Release);
                Err(HardwareError::Disconnected)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn stats(&self) -> LinkStats {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for SerialMotorLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialMotorLink")
            .field("port", &self.port_name)
            .field("connected", &self.is_connected())
            .finish()
    }
}

async fn writer_task<W>(
    mut writer: W,
    mut command_rx: mpsc::Receiver<String>,
    connected: Arc<AtomicBool>,
    stats: Arc<SerialStats>,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = command_rx.recv().await {
        tracing::trace!("Serial TX: {}", line.trim_end());
        match timeout(write_timeout, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {
                stats.commands_sent.fetch_add(1, Ordering::Relaxed);
                stats.bytes_written.fetch_add(line.len() as u64, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                tracing::error!("Serial write error: {}", e);
                break;
            }
            Err(_) => {
                tracing::error!("Serial write timed out after {:?}", write_timeout);
                break;
            }
        }
    }
    connected.store(false, Ordering::Release);
    tracing::warn!("Motor link marked unavailable; serial writer stopped");
}

/// Drain and log whatever the motor controller prints back.
async fn reader_task<R>(
    mut reader: R,
    connected: Arc<AtomicBool>,
    stats: Arc<SerialStats>,
    read_timeout: Duration,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 256];
    let mut pending = String::new();
    while connected.load(Ordering::Acquire) {
        match timeout(read_timeout, reader.read(&mut buf)).await {
            Err(_) => continue,
            Ok(Ok(0)) => {
                tracing::info!("Serial connection closed by remote");
                connected.store(false, Ordering::Release);
                break;
            }
            Ok(Ok(n)) => {
                for line in take_lines(&mut pending, &String::from_utf8_lossy(&buf[..n])) {
                    stats.lines_received.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Serial RX: {}", line);
                }
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Ok(Err(e)) => {
                tracing::warn!("Serial read error: {}", e);
                break;
            }
        }
    }
}

/// Append `chunk` and return every complete, non-empty line. A partial line
/// longer than `MAX_PENDING_RESPONSE` is thrown away.
fn take_lines(pending: &mut String, chunk: &str) -> Vec<String> {
    pending.push_str(chunk);
    let mut lines = Vec::new();
    while let Some(idx) = pending.find('\n') {
        let line: String = pending.drain(..=idx).collect();
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    if pending.len() > MAX_PENDING_RESPONSE {
        tracing::debug!("Discarding {} bytes of unterminated serial response", pending.len());
        pending.clear();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_open_missing_port_reports_open_error() {
        let config = SerialConfig {
            port: "/dev/this-port-does-not-exist".to_string(),
            ..SerialConfig::default()
        };
        match SerialMotorLink::open(&config) {
            Err(HardwareError::Open { port, .. }) => assert_eq!(port, "/dev/this-port-does-not-exist"),
            other => panic!("expected open error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_commands_reach_the_wire() {
        let (writer, mut device) = duplex(64);
        let (reader, _device_tx) = duplex(64);
        let mut link = SerialMotorLink::with_io(writer, reader, "test".into(), &SerialConfig::default());

        link.send(&MotorCommand::new(1.0, -0.5, 0.0, 0.25)).unwrap();
        let mut line = [0u8; 13];
        device.read_exact(&mut line).await.unwrap();
        assert_eq!(&line, b"100,-50,0,25\n");
        wait_until(|| link.stats().commands_sent == 1).await;
        assert_eq!(link.stats().bytes_written, 13);
    }

    #[tokio::test]
    async fn test_failed_write_marks_link_disconnected() {
        let (writer, device) = duplex(64);
        drop(device);
        let (reader, _device_tx) = duplex(64);
        let mut link = SerialMotorLink::with_io(writer, reader, "test".into(), &SerialConfig::default());

        // Queued before the writer notices the broken stream
        assert!(link.send(&MotorCommand::zero()).is_ok());
        wait_until(|| !link.is_connected()).await;

        assert!(matches!(link.send(&MotorCommand::zero()), Err(HardwareError::Disconnected)));
        assert_eq!(link.stats().commands_sent, 0);
    }

    #[tokio::test]
    async fn test_stalled_write_times_out_and_disconnects() {
        // Device never reads, so the 8-byte line cannot fit the 4-byte pipe.
        let (writer, _device) = duplex(4);
        let (reader, _device_tx) = duplex(64);
        let mut link = SerialMotorLink::with_io(writer, reader, "test".into(), &SerialConfig::default());

        link.send(&MotorCommand::zero()).unwrap();
        wait_until(|| !link.is_connected()).await;
        assert!(matches!(link.send(&MotorCommand::zero()), Err(HardwareError::Disconnected)));
    }

    #[tokio::test]
    async fn test_queue_full_is_transient() {
        let (writer, _device) = duplex(4);
        let (reader, _device_tx) = duplex(64);
        let config = SerialConfig {
            queue_depth: 1,
            write_timeout: 10.0,
            ..SerialConfig::default()
        };
        let mut link = SerialMotorLink::with_io(writer, reader, "test".into(), &config);

        let mut results = Vec::new();
        for _ in 0..4 {
            results.push(link.send(&MotorCommand::zero()));
        }
        let err = results.into_iter().find_map(Result::err).unwrap();
        assert!(matches!(err, HardwareError::QueueFull));
        assert!(err.is_transient());
        assert!(link.is_connected());
        assert!(link.stats().commands_dropped >= 1);
    }

    #[tokio::test]
    async fn test_responses_are_counted() {
        let (writer, _device) = duplex(64);
        let (reader, mut device_tx) = duplex(64);
        let link = SerialMotorLink::with_io(writer, reader, "test".into(), &SerialConfig::default());

        device_tx.write_all(b"ok\r\nstatus 1\n").await.unwrap();
        wait_until(|| link.stats().lines_received == 2).await;
    }

    #[test]
    fn test_take_lines_splits_and_keeps_partial() {
        let mut pending = String::new();
        assert_eq!(take_lines(&mut pending, "ok\nbat"), vec!["ok".to_string()]);
        assert_eq!(pending, "bat");
        assert_eq!(take_lines(&mut pending, "tery 12.1\n\n"), vec!["battery 12.1".to_string()]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_take_lines_caps_unterminated_response() {
        let mut pending = String::new();
        let noise = "x".repeat(MAX_PENDING_RESPONSE + 1);
        assert!(take_lines(&mut pending, &noise).is_empty());
        assert!(pending.is_empty());
        assert_eq!(take_lines(&mut pending, "ok\n"), vec!["ok".to_string()]);
    }
}
