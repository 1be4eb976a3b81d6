use anyhow::Context;
use tokio::net::UdpSocket;
use simtel_ingest_core::*;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// One JSON record per datagram; anything longer than this is truncated and
/// fails to decode.
const MAX_DATAGRAM: usize = 4096;

#[derive(Clone, Debug)]
pub struct UdpConfig {
    pub bind_addr: String,      // e.g. "0.0.0.0:9000"
    pub recv_timeout: Duration, // bounds each wait so stop is noticed
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self { bind_addr: "0.0.0.0:9000".into(), recv_timeout: Duration::from_millis(1000) }
    }
}

/// Receives JSON telemetry records over UDP.
pub struct UdpSource {
    socket: UdpSocket,
    cfg: UdpConfig,
    control: Arc<ControlState>,
    buf: Vec<u8>,
    received: u64,
    rejected: u64,
}

impl UdpSource {
    pub async fn bind(cfg: UdpConfig, control: Arc<ControlState>) -> Result<Self, IngestError> {
        let socket = UdpSocket::bind(&cfg.bind_addr).await
            .with_context(|| format!("bind {}", cfg.bind_addr))?;
        info!(addr = %cfg.bind_addr, "UDP telemetry listener started");
        Ok(Self { socket, cfg, control, buf: vec![0u8; MAX_DATAGRAM], received: 0, rejected: 0 })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, IngestError> {
        Ok(self.socket.local_addr().context("local_addr")?)
    }
}

#[async_trait::async_trait]
impl TelemetrySource for UdpSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Network
    }

    async fn next_sample(&mut self) -> Option<TelemetrySample> {
        let Self { socket, cfg, control, buf, received, rejected } = self;
        while control.is_running() {
            let recv = tokio::select! {
                _ = control.stopped() => break,
                r = tokio::time::timeout(cfg.recv_timeout, socket.recv_from(&mut buf[..])) => r,
            };
            let (len, peer) = match recv {
                Ok(Ok(got)) => got,
                Ok(Err(e)) => {
                    warn!(error = %e, "UDP receive error");
                    control.sleep(Duration::from_millis(100)).await;
                    continue;
                }
                Err(_) => {
                    trace!("No telemetry datagram (timeout)");
                    continue;
                }
            };
            *received += 1;
            if control.is_paused() {
                debug!(%peer, "Paused, datagram discarded");
                continue;
            }
            match TelemetrySample::from_json(&buf[..len]) {
                Ok(sample) => return Some(sample),
                Err(e) => {
                    *rejected += 1;
                    warn!(
                        %peer,
                        error = %e,
                        payload = %String::from_utf8_lossy(&buf[..len]),
                        "[Invalid JSON] datagram discarded"
                    );
                }
            }
        }
        info!(received = *received, rejected = *rejected, "UDP telemetry listener stopped");
        None
    }
}
