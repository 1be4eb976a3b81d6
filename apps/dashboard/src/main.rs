//! `simtel` – live vehicle telemetry dashboard.
//!
//! Asks for a telemetry source (simulated, UDP or serial), then renders every
//! sample to the terminal and appends it to a per-run session log while the
//! operator steers the run with `pause`, `resume`, `stop` and `speed=<int>`.

mod commands;
mod config;
mod dashboard;
mod session;
mod sink;

use std::io::{self, BufReader};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::warn;

use simtel_ingest_core::ControlState;
use simtel_io::SessionLog;

use config::Config;
use dashboard::Dashboard;
use sink::TelemetrySink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr so they never mix with dashboard frames.
    // RUST_LOG overrides the default "warn"; SIMTEL_LOG_FORMAT=json switches
    // to newline-delimited JSON.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    if std::env::var("SIMTEL_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .compact()
            .init();
    }

    let mut cfg = match config::load() {
        Ok(cfg) => cfg.unwrap_or_default(),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Config error, using defaults");
            Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);

    let mut input = BufReader::new(io::stdin());
    let mode = session::prompt_mode(&mut input, &mut io::stdout())?;

    let control = Arc::new(ControlState::new());
    let log = SessionLog::new(&cfg.log_dir, OffsetDateTime::now_utc())?;
    let log_path = log.path().to_path_buf();
    let sink = Arc::new(TelemetrySink::new(Dashboard::new(io::stdout()), log));

    let emitted = session::run(mode, &cfg, control, sink, input, io::stdout()).await?;
    println!("Stopped after {} sample(s). Session log: {}", emitted, log_path.display());
    Ok(())
}
