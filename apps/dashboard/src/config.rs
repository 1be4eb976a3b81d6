//! Runtime settings, read from `simtel.toml` (or `$SIMTEL_CONFIG`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use simtel_ingest_serial::SerialConfig;
use simtel_ingest_sim::SimConfig;
use simtel_ingest_udp::UdpConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Simulated source period.
    pub tick_ms: u64,
    /// Re-check period of the simulated source while paused.
    pub pause_backoff_ms: u64,
    pub udp_bind: String,
    pub udp_recv_timeout_ms: u64,
    /// Serial device; first enumerated port when unset.
    pub serial_port: Option<String>,
    pub serial_baud: u32,
    pub serial_queue: usize,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            pause_backoff_ms: 500,
            udp_bind: "0.0.0.0:9000".into(),
            udp_recv_timeout_ms: 1000,
            serial_port: None,
            serial_baud: 9600,
            serial_queue: 64,
            log_dir: PathBuf::from("telemetry_logs"),
        }
    }
}

impl Config {
    pub fn sim(&self) -> SimConfig {
        SimConfig {
            tick: Duration::from_millis(self.tick_ms),
            pause_backoff: Duration::from_millis(self.pause_backoff_ms),
        }
    }

    pub fn udp(&self) -> UdpConfig {
        UdpConfig {
            bind_addr: self.udp_bind.clone(),
            recv_timeout: Duration::from_millis(self.udp_recv_timeout_ms),
        }
    }

    pub fn serial(&self) -> SerialConfig {
        SerialConfig {
            port: self.serial_port.clone(),
            baud_rate: self.serial_baud,
            queue: self.serial_queue,
            ..SerialConfig::default()
        }
    }
}

pub fn config_path() -> PathBuf {
    std::env::var_os("SIMTEL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("simtel.toml"))
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>> {
    load_from(&config_path())
}

pub fn load_from(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg = toml::from_str(&raw)
        .with_context(|| format!("parse config {}", path.display()))?;
    Ok(Some(cfg))
}

/// Apply `SIMTEL_*` environment overrides.
///
/// | Variable | Config field |
/// |---|---|
/// | `SIMTEL_LOG_DIR` | `log_dir` |
/// | `SIMTEL_UDP_BIND` | `udp_bind` |
/// | `SIMTEL_TICK_MS` | `tick_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SIMTEL_LOG_DIR") {
        cfg.log_dir = PathBuf::from(v);
    }
    if let Some(v) = var("SIMTEL_UDP_BIND") {
        cfg.udp_bind = v;
    }
    if let Some(ms) = var("SIMTEL_TICK_MS").and_then(|v| v.parse().ok()) {
        cfg.tick_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.sim().tick, Duration::from_millis(1000));
        assert_eq!(cfg.sim().pause_backoff, Duration::from_millis(500));
        assert_eq!(cfg.udp().bind_addr, "0.0.0.0:9000");
        assert_eq!(cfg.udp().recv_timeout, Duration::from_millis(1000));
        assert_eq!(cfg.serial().baud_rate, 9600);
        assert_eq!(cfg.serial().port, None);
        assert_eq!(cfg.log_dir, PathBuf::from("telemetry_logs"));
    }

    #[test]
    fn missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(load_from(&tmp.path().join("simtel.toml")).unwrap(), None);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("simtel.toml");
        fs::write(&path, "tick_ms = 250\nserial_port = \"/dev/ttyUSB0\"\n").unwrap();
        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.tick_ms, 250);
        assert_eq!(cfg.serial().port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(cfg.udp_bind, "0.0.0.0:9000");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("simtel.toml");
        fs::write(&path, "tick_ms = \"soon\"").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, |k| match k {
            "SIMTEL_LOG_DIR" => Some("/tmp/simtel".into()),
            "SIMTEL_UDP_BIND" => Some("127.0.0.1:9100".into()),
            "SIMTEL_TICK_MS" => Some("often".into()),
            _ => None,
        });
        assert_eq!(cfg.log_dir, PathBuf::from("/tmp/simtel"));
        assert_eq!(cfg.udp_bind, "127.0.0.1:9100");
        assert_eq!(cfg.tick_ms, 1000);
    }
}
