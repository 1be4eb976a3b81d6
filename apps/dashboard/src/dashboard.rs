// apps/dashboard/src/dashboard.rs
use crossterm::{cursor::MoveTo, queue, terminal::{Clear, ClearType}};
use parking_lot::Mutex;
use std::io::{self, Write};
use time::macros::format_description;
use simtel_ingest_core::{SourceKind, TelemetrySample};

pub const BAR_CELLS: usize = 20;
pub const HELP_LINE: &str = "Commands: pause | resume | stop | speed=123";

const BAR_FILL: char = '▮';

/// Filled cells for a pedal fraction. Out-of-range and non-finite inputs are
/// clamped instead of rejected.
pub fn bar_cells(fraction: f64) -> usize {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction * BAR_CELLS as f64).floor().clamp(0.0, BAR_CELLS as f64) as usize
}

fn bar(fraction: f64) -> String {
    let filled = bar_cells(fraction);
    let mut s: String = std::iter::repeat(BAR_FILL).take(filled).collect();
    s.extend(std::iter::repeat(' ').take(BAR_CELLS - filled));
    s
}

pub fn render_frame(sample: &TelemetrySample, kind: SourceKind) -> String {
    let clock = sample
        .timestamp
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "--:--:--".into());
    let rule = "+----------------------------+";
    [
        format!("[Mode: {kind}] - {clock}"),
        rule.to_string(),
        format!("| Speed: {} km/h", sample.speed),
        format!("| RPM:   {}", sample.rpm),
        format!("| Gear:  {}", sample.gear),
        rule.to_string(),
        format!("Throttle: {} {:.0}%", bar(sample.throttle), sample.throttle * 100.0),
        format!("Brake:    {} {:.0}%", bar(sample.brake), sample.brake * 100.0),
        String::new(),
        HELP_LINE.to_string(),
        String::new(),
    ]
    .join("\n")
}

/// Text dashboard. Each frame replaces the previous one.
pub struct Dashboard<W: Write> {
    out: Mutex<W>,
}

impl<W: Write> Dashboard<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn show(&self, sample: &TelemetrySample, kind: SourceKind) -> io::Result<()> {
        let frame = render_frame(sample, kind);
        let mut out = self.out.lock();
        queue!(&mut *out, Clear(ClearType::All), MoveTo(0, 0))?;
        out.write_all(frame.as_bytes())?;
        out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}
