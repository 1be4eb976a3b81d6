use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use time::{macros::format_description, OffsetDateTime};
use simtel_ingest_core::TelemetrySample;

/// `session_<YYYYMMDD_HHMMSS>.jsonl` for a run started at `started`.
pub fn session_file_name(started: OffsetDateTime) -> Result<String> {
    let stamp = started.format(format_description!("[year][month][day]_[hour][minute][second]"))?;
    Ok(format!("session_{stamp}.jsonl"))
}

/// Append-only newline-delimited JSON log of one run.
///
/// Every append re-checks the directory and writes a whole record with a
/// single `write_all` under the lock, so records from concurrent callers never
/// interleave and a deleted directory is recreated on the next sample.
pub struct SessionLog {
    dir: PathBuf,
    path: PathBuf,
    lock: Mutex<()>,
}

impl SessionLog {
    pub fn new(dir: impl Into<PathBuf>, started: OffsetDateTime) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(session_file_name(started)?);
        Ok(Self { dir, path, lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, sample: &TelemetrySample) -> Result<()> {
        let mut record = sample.to_json()?;
        record.push('\n');

        let _guard = self.lock.lock();
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create log dir {}", self.dir.display()))?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        f.write_all(record.as_bytes())
            .with_context(|| format!("append to {}", self.path.display()))?;
        Ok(())
    }
}

/// Read a session file back, one sample per non-empty line.
pub fn read_session(path: &Path) -> Result<Vec<TelemetrySample>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut samples = vec![];
    for (n, line) in BufReader::new(f).lines().enumerate() {
        let s = line?;
        if s.trim().is_empty() { continue; }
        let sample = TelemetrySample::from_json(s.as_bytes())
            .with_context(|| format!("{}:{}", path.display(), n + 1))?;
        samples.push(sample);
    }
    Ok(samples)
}
