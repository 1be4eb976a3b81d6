use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use anyhow::anyhow;
use tracing::{error, info, warn};

use simtel_ingest_core::{
    channel, ControlState, IngestError, SourceKind, TelemetryRx, TelemetrySource, TelemetryTx,
};
use simtel_ingest_serial::SerialSource;
use simtel_ingest_sim::SimulatedSource;
use simtel_ingest_udp::UdpSource;

use crate::commands;
use crate::config::Config;
use crate::sink::TelemetrySink;

/// Which source feeds this run; chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Simulated,
    Network,
    Serial,
}

impl Mode {
    /// `1`, `2` or `3`; anything else falls back to Simulated.
    pub fn from_choice(input: &str) -> Mode {
        match input.trim() {
            "2" => Mode::Network,
            "3" => Mode::Serial,
            _ => Mode::Simulated,
        }
    }

    pub fn kind(self) -> SourceKind {
        match self {
            Mode::Simulated => SourceKind::Simulated,
            Mode::Network => SourceKind::Network,
            Mode::Serial => SourceKind::Serial,
        }
    }
}

pub fn prompt_mode<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<Mode> {
    writeln!(out, "Choose telemetry mode:")?;
    writeln!(out, "1. Simulated")?;
    writeln!(out, "2. UDP")?;
    writeln!(out, "3. Serial")?;
    write!(out, "Enter option (1/2/3): ")?;
    out.flush()?;

    let mut choice = String::new();
    input.read_line(&mut choice)?;
    Ok(Mode::from_choice(&choice))
}

pub async fn build_source(
    mode: Mode,
    cfg: &Config,
    control: Arc<ControlState>,
) -> Result<Box<dyn TelemetrySource>, IngestError> {
    let src: Box<dyn TelemetrySource> = match mode {
        Mode::Simulated => Box::new(SimulatedSource::new(cfg.sim(), control)),
        Mode::Network => {
            let src = UdpSource::bind(cfg.udp(), control).await?;
            info!(addr = %src.local_addr()?, "Listening for UDP telemetry");
            Box::new(src)
        }
        Mode::Serial => {
            // port enumeration and open are blocking device calls
            let serial_cfg = cfg.serial();
            let src = tokio::task::spawn_blocking(move || SerialSource::open(serial_cfg, control))
                .await
                .map_err(anyhow::Error::from)??;
            info!(port = src.port_name(), "Reading serial telemetry");
            Box::new(src)
        }
    };
    Ok(src)
}

/// Producer task. A source that cannot start only ends itself; the rest of
/// the run keeps going so the operator can still stop it.
async fn run_source(mode: Mode, cfg: Config, control: Arc<ControlState>, tx: TelemetryTx) {
    let mut src = match build_source(mode, &cfg, control).await {
        Ok(src) => src,
        Err(IngestError::NoSerialPorts) => {
            warn!("No serial ports detected");
            return;
        }
        Err(e) => {
            error!(?mode, error = %e, "Telemetry source failed to start");
            return;
        }
    };
    if let Err(e) = src.run(tx).await {
        error!(?mode, error = %e, "Telemetry source failed");
    }
}

/// Drain samples on a dedicated thread, one at a time in arrival order.
/// Returns the number of samples handed to the sink.
pub fn run_sink<W>(
    rx: TelemetryRx,
    kind: SourceKind,
    sink: Arc<TelemetrySink<W>>,
    control: Arc<ControlState>,
) -> thread::JoinHandle<u64>
where
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        let mut emitted = 0;
        for sample in rx.iter() {
            if !control.is_running() {
                break;
            }
            sink.emit(&sample, kind);
            emitted += 1;
        }
        emitted
    })
}

/// Run one session: the selected source, the sink and the operator command
/// loop, until stop. Waits for every unit to finish before returning.
pub async fn run<R, F, W>(
    mode: Mode,
    cfg: &Config,
    control: Arc<ControlState>,
    sink: Arc<TelemetrySink<W>>,
    commands: R,
    feedback: F,
) -> anyhow::Result<u64>
where
    R: BufRead + Send + 'static,
    F: Write + Send + 'static,
    W: Write + Send + 'static,
{
    info!(?mode, log = %sink.log_path().display(), "Session starting");
    let (tx, rx) = channel();
    let consumer = run_sink(rx, mode.kind(), sink, control.clone());
    let producer = tokio::spawn(run_source(mode, cfg.clone(), control.clone(), tx));
    let operator = tokio::task::spawn_blocking({
        let control = control.clone();
        move || commands::run(commands, feedback, &control)
    });

    operator.await?;
    control.stop();
    producer.await?;
    let emitted = tokio::task::spawn_blocking(move || consumer.join())
        .await?
        .map_err(|_| anyhow!("sink thread panicked"))?;
    info!(emitted, "Session stopped");
    Ok(emitted)
}
