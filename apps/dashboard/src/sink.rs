use std::io::Write;
use std::path::Path;
use tracing::warn;

use simtel_ingest_core::{SourceKind, TelemetrySample};
use simtel_io::SessionLog;

use crate::dashboard::Dashboard;

/// Consumer side of a run: draws each sample and appends it to the session
/// log. Neither half ever fails the caller.
pub struct TelemetrySink<W: Write> {
    dashboard: Dashboard<W>,
    log: SessionLog,
}

impl<W: Write> TelemetrySink<W> {
    pub fn new(dashboard: Dashboard<W>, log: SessionLog) -> Self {
        Self { dashboard, log }
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    pub fn render(&self, sample: &TelemetrySample, kind: SourceKind) {
        if let Err(e) = self.dashboard.show(sample, kind) {
            warn!(error = %e, "[Render Error]");
        }
    }

    pub fn log(&self, sample: &TelemetrySample) {
        if let Err(e) = self.log.append(sample) {
            warn!(error = %format!("{e:#}"), "[Logging Error]");
        }
    }

    pub fn emit(&self, sample: &TelemetrySample, kind: SourceKind) {
        self.render(sample, kind);
        self.log(sample);
    }
}
