//! Stand-in telemetry feed: sends one JSON record per interval to the
//! dashboard's UDP port until Ctrl-C.

use anyhow::Context;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{info, warn};

use simtel_ingest_sim::{SampleGenerator, SampleRanges};

#[derive(Clone, Debug)]
struct SenderConfig {
    target: String,
    interval: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self { target: "127.0.0.1:9000".into(), interval: Duration::from_millis(1000) }
    }
}

impl SenderConfig {
    /// `SIMTEL_SENDER_TARGET` and `SIMTEL_SENDER_INTERVAL_MS` override the defaults.
    fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(target) = std::env::var("SIMTEL_SENDER_TARGET") {
            cfg.target = target;
        }
        if let Some(ms) = std::env::var("SIMTEL_SENDER_INTERVAL_MS").ok().and_then(|v| v.parse().ok()) {
            cfg.interval = Duration::from_millis(ms);
        }
        cfg
    }
}

/// Send one freshly generated record, returning the JSON that went out.
async fn send_one(socket: &UdpSocket, target: &str, generator: &mut SampleGenerator) -> anyhow::Result<String> {
    let json = generator.generate(None).to_json()?;
    socket
        .send_to(json.as_bytes(), target)
        .await
        .with_context(|| format!("send to {target}"))?;
    Ok(json)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let cfg = SenderConfig::from_env();
    let socket = UdpSocket::bind("0.0.0.0:0").await.context("bind sender socket")?;
    let mut generator = SampleGenerator::new(SampleRanges::sender());
    let mut ticker = tokio::time::interval(cfg.interval);

    println!("Sending UDP telemetry to {}", cfg.target);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                match send_one(&socket, &cfg.target, &mut generator).await {
                    Ok(json) => println!("Sent: {json}"),
                    // the dashboard may simply not be listening yet
                    Err(e) => warn!(error = %format!("{e:#}"), "Send failed"),
                }
            }
        }
    }
    info!("Sender stopped");
    Ok(())
}
