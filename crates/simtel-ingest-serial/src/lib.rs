//! Serial-line telemetry. A reader thread turns delimited lines into samples
//! and hands them to the async side through a bounded queue.

mod parse;

pub use parse::{parse_line, parse_line_at, SerialLineError};

use anyhow::Context;
use simtel_ingest_core::*;
use std::io::{BufRead, BufReader, ErrorKind};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

#[derive(Clone, Debug)]
pub struct SerialConfig {
    /// Explicit device; the first enumerated port is used when unset.
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Read timeout on the device, bounds how long stop can go unnoticed.
    pub read_timeout: Duration,
    /// Samples buffered between the reader thread and the consumer.
    pub queue: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { port: None, baud_rate: 9600, read_timeout: Duration::from_millis(1000), queue: 64 }
    }
}

pub struct SerialSource {
    port_name: String,
    control: Arc<ControlState>,
    rx: mpsc::Receiver<TelemetrySample>,
}

impl SerialSource {
    /// Open the configured (or first available) serial port.
    pub fn open(cfg: SerialConfig, control: Arc<ControlState>) -> Result<Self, IngestError> {
        let port_name = match &cfg.port {
            Some(p) => p.clone(),
            None => first_port()?,
        };
        let port = serialport::new(&port_name, cfg.baud_rate)
            .timeout(cfg.read_timeout)
            .open()
            .with_context(|| format!("open {port_name}"))?;
        info!(port = %port_name, baud = cfg.baud_rate, "Serial port opened");
        Self::from_reader(BufReader::new(port), port_name, cfg.queue, control)
    }

    /// Drive the source from any line reader (a device or a test fixture).
    pub fn from_reader<R>(
        reader: R,
        port_name: String,
        queue: usize,
        control: Arc<ControlState>,
    ) -> Result<Self, IngestError>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let reader_control = control.clone();
        thread::Builder::new()
            .name("serial-reader".into())
            .spawn(move || read_lines(reader, tx, reader_control))
            .context("spawn serial reader")?;
        Ok(Self { port_name, control, rx })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

fn first_port() -> Result<String, IngestError> {
    let ports = serialport::available_ports().context("enumerate serial ports")?;
    debug!(count = ports.len(), "Serial ports enumerated");
    ports.into_iter().next().map(|p| p.port_name).ok_or(IngestError::NoSerialPorts)
}

/// Reader loop. Runs until stop, end of stream, a hard read error, or the
/// consumer going away. Bytes that are not UTF-8 reach the parser replaced,
/// so a garbled line is dropped like any other malformed one.
fn read_lines<R: BufRead>(mut reader: R, tx: mpsc::Sender<TelemetrySample>, control: Arc<ControlState>) {
    let mut buf = Vec::new();
    while control.is_running() {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!("Serial stream closed");
                break;
            }
            Ok(_) => {
                let keep_going = on_line(&String::from_utf8_lossy(&buf), &tx, &control);
                buf.clear();
                if !keep_going {
                    break;
                }
            }
            // partial data stays in `buf` until the delimiter arrives
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                trace!("Serial read timed out");
            }
            Err(e) => {
                warn!(error = %e, "Serial read failed");
                break;
            }
        }
    }
    debug!("Serial reader exiting");
}

fn on_line(line: &str, tx: &mpsc::Sender<TelemetrySample>, control: &ControlState) -> bool {
    if !control.is_running() {
        return false;
    }
    if control.is_paused() {
        trace!("Paused, serial line discarded");
        return true;
    }
    match parse_line(line) {
        Ok(sample) => tx.blocking_send(sample).is_ok(),
        Err(e) => {
            debug!(error = %e, line = line.trim_end(), "Malformed serial line dropped");
            true
        }
    }
}

#[async_trait::async_trait]
impl TelemetrySource for SerialSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Serial
    }

    async fn next_sample(&mut self) -> Option<TelemetrySample> {
        if !self.control.is_running() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.control.stopped() => None,
            sample = self.rx.recv() => sample.filter(|_| self.control.is_running()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn source(input: &str, control: &Arc<ControlState>) -> SerialSource {
        let reader = Cursor::new(input.as_bytes().to_vec());
        SerialSource::from_reader(reader, "test".into(), 8, control.clone()).unwrap()
    }

    #[tokio::test]
    async fn yields_parsed_lines_in_order() {
        let control = Arc::new(ControlState::new());
        let mut src = source("Speed=100,RPM=5000,Gear=2\nSpeed=101,RPM=5100,Gear=3,Throttle=0.4\n", &control);
        assert_eq!(src.kind(), SourceKind::Serial);
        assert_eq!(src.port_name(), "test");
        assert_eq!(src.next_sample().await.unwrap().speed, 100);
        let second = src.next_sample().await.unwrap();
        assert_eq!((second.speed, second.throttle), (101, 0.4));
        assert!(src.next_sample().await.is_none());
    }

    #[tokio::test]
    async fn malformed_lines_are_dropped() {
        let control = Arc::new(ControlState::new());
        let mut src = source("garbage\nSpeed=x,RPM=1,Gear=1\n\nSpeed=7,RPM=1,Gear=1", &control);
        assert_eq!(src.next_sample().await.unwrap().speed, 7);
        assert!(src.next_sample().await.is_none());
    }

    #[tokio::test]
    async fn garbled_bytes_do_not_end_the_stream() {
        let control = Arc::new(ControlState::new());
        let reader = Cursor::new(b"Speed=1,RPM=1,Gear=1\nSp\xffeed=2\nSpeed=3,RPM=1,Gear=1\n".to_vec());
        let mut src = SerialSource::from_reader(reader, "noisy".into(), 8, control).unwrap();
        assert_eq!(src.next_sample().await.map(|s| s.speed), Some(1));
        assert_eq!(src.next_sample().await.map(|s| s.speed), Some(3));
        assert!(src.next_sample().await.is_none());
    }

    #[tokio::test]
    async fn override_is_not_applied() {
        let control = Arc::new(ControlState::new());
        control.set_speed_override(999);
        let mut src = source("Speed=55,RPM=1,Gear=1\n", &control);
        assert_eq!(src.next_sample().await.unwrap().speed, 55);
    }

    #[tokio::test]
    async fn paused_lines_are_discarded() {
        let control = Arc::new(ControlState::new());
        control.pause();
        let mut src = source("Speed=1,RPM=1,Gear=1\nSpeed=2,RPM=1,Gear=1\n", &control);
        assert!(src.next_sample().await.is_none());
    }

    /// Mimics a quiet device: every read times out.
    struct Quiet;

    impl Read for Quiet {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            thread::sleep(Duration::from_millis(5));
            Err(ErrorKind::TimedOut.into())
        }
    }

    #[tokio::test]
    async fn stop_ends_the_sequence() {
        let control = Arc::new(ControlState::new());
        let mut src = SerialSource::from_reader(BufReader::new(Quiet), "quiet".into(), 1, control.clone()).unwrap();
        let handle = tokio::spawn(async move { src.next_sample().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        control.stop();
        let out = tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn reader_exits_when_consumer_is_gone() {
        let control = Arc::new(ControlState::new());
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let reader = Cursor::new(b"Speed=1,RPM=1,Gear=1\nSpeed=2,RPM=1,Gear=1\n".to_vec());
        // returns instead of blocking on a closed queue
        read_lines(reader, tx, control);
    }
}
