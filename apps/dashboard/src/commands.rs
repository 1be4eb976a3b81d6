// apps/dashboard/src/commands.rs
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

use simtel_ingest_core::ControlState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Stop,
    Speed(i32),
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("speed must be an integer, got {0:?}")]
    InvalidSpeed(String),
}

impl Command {
    /// Case-insensitive, surrounding whitespace ignored.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let cmd = line.trim().to_lowercase();
        match cmd.as_str() {
            "" => Err(CommandError::Empty),
            "pause" => Ok(Command::Pause),
            "resume" => Ok(Command::Resume),
            "stop" => Ok(Command::Stop),
            other => match other.strip_prefix("speed=") {
                Some(v) => v
                    .trim()
                    .parse()
                    .map(Command::Speed)
                    .map_err(|_| CommandError::InvalidSpeed(v.to_string())),
                None => Err(CommandError::Unknown(other.to_string())),
            },
        }
    }

    pub fn apply(self, control: &ControlState) {
        match self {
            Command::Pause => {
                control.pause();
            }
            Command::Resume => {
                control.resume();
            }
            Command::Stop => control.stop(),
            Command::Speed(v) => control.set_speed_override(v),
        }
        info!(command = ?self, phase = ?control.phase(), "Operator command applied");
    }
}

/// Read operator commands line by line until stop. End of input counts as
/// stop so the run can always wind down.
pub fn run<R: BufRead, W: Write>(mut input: R, mut out: W, control: &ControlState) {
    let mut line = String::new();
    while control.is_running() {
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => {
                info!("Operator input closed, stopping");
                control.stop();
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Operator input failed, stopping");
                control.stop();
                break;
            }
        }

        match Command::parse(&line) {
            Ok(cmd) => cmd.apply(control),
            Err(CommandError::Empty) => {}
            Err(e) => {
                debug!(error = %e, "Rejected operator command");
                let _ = writeln!(out, "[Invalid Command] {e}");
                let _ = out.flush();
            }
        }
    }
}
