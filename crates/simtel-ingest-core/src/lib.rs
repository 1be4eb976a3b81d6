//! Core telemetry model and traits shared by every SimTel source

mod control;

pub use control::{ControlState, Phase};

use serde::{Serialize, Deserialize};
use std::fmt;
use time::OffsetDateTime;

/// Where a sample came from; shown in the dashboard header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Simulated,
    Network,
    Serial,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Simulated => write!(f, "Simulated"),
            SourceKind::Network => write!(f, "UDP"),
            SourceKind::Serial => write!(f, "Serial"),
        }
    }
}

/// One immutable snapshot of vehicle state.
///
/// Values are carried as received: nothing here range-checks speed, gear or
/// the pedal fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    #[serde(rename = "Speed")]
    pub speed: i32,      // km/h
    #[serde(rename = "RPM")]
    pub rpm: i32,
    #[serde(rename = "Gear")]
    pub gear: i32,
    #[serde(rename = "Throttle")]
    pub throttle: f64,   // 0..1 nominal
    #[serde(rename = "Brake")]
    pub brake: f64,      // 0..1 nominal
    #[serde(rename = "Timestamp", with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl TelemetrySample {
    /// Decode one wire/log record.
    pub fn from_json(payload: &[u8]) -> Result<Self, ParseError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Encode as a single-line wire/log record (no trailing newline).
    pub fn to_json(&self) -> Result<String, ParseError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed telemetry record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("no serial ports detected")]
    NoSerialPorts,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type TelemetryTx = crossbeam_channel::Sender<TelemetrySample>;
pub type TelemetryRx = crossbeam_channel::Receiver<TelemetrySample>;

/// Trait for any live source connector.
///
/// A source is a lazy, unbounded sequence: `next_sample` suspends until the
/// next sample is ready and returns `None` once the run is stopped. Pausing is
/// handled inside each source, so a paused source simply takes longer to
/// return.
#[async_trait::async_trait]
pub trait TelemetrySource: Send {
    fn kind(&self) -> SourceKind;

    async fn next_sample(&mut self) -> Option<TelemetrySample>;

    /// Forward samples into `tx` until the sequence ends or the consumer hangs up.
    async fn run(&mut self, tx: TelemetryTx) -> Result<(), IngestError> {
        while let Some(sample) = self.next_sample().await {
            if tx.send(sample).is_err() {
                break;
            }
        }
        Ok(())
    }
}

pub fn channel() -> (TelemetryTx, TelemetryRx) {
    crossbeam_channel::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> TelemetrySample {
        TelemetrySample {
            speed: 180,
            rpm: 6000,
            gear: 4,
            throttle: 0.5,
            brake: 0.1,
            timestamp: datetime!(2024-01-01 00:00:00 UTC),
        }
    }

    #[test]
    fn decodes_sender_record() {
        let raw = br#"{"Speed":180,"RPM":6000,"Gear":4,"Throttle":0.5,"Brake":0.1,"Timestamp":"2024-01-01T00:00:00Z"}"#;
        let decoded = TelemetrySample::from_json(raw).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn encodes_with_exact_field_names() {
        let json = sample().to_json().unwrap();
        for key in ["\"Speed\":", "\"RPM\":", "\"Gear\":", "\"Throttle\":", "\"Brake\":", "\"Timestamp\":"] {
            assert!(json.contains(key), "{key} missing from {json}");
        }
        assert!(json.contains("2024-01-01T00:00:00Z"));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn round_trip_keeps_every_field() {
        let mut s = sample();
        s.timestamp = datetime!(2025-06-30 13:45:12.123456789 UTC);
        s.speed = -5;
        s.throttle = 1.37;
        let back = TelemetrySample::from_json(s.to_json().unwrap().as_bytes()).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn rejects_plain_text_and_lowercase_fields() {
        assert!(TelemetrySample::from_json(b"not json").is_err());
        let lower = br#"{"speed":180,"rpm":6000,"gear":4,"throttle":0.5,"brake":0.1,"timestamp":"2024-01-01T00:00:00Z"}"#;
        assert!(TelemetrySample::from_json(lower).is_err());
    }

    #[test]
    fn source_kind_display_names() {
        assert_eq!(SourceKind::Simulated.to_string(), "Simulated");
        assert_eq!(SourceKind::Network.to_string(), "UDP");
        assert_eq!(SourceKind::Serial.to_string(), "Serial");
    }

    #[test]
    fn ingest_errors_read_as_diagnostics() {
        assert_eq!(IngestError::NoSerialPorts.to_string(), "no serial ports detected");
        let wrapped: IngestError = anyhow::anyhow!("open /dev/ttyUSB0").into();
        assert!(matches!(wrapped, IngestError::Other(_)));
        assert_eq!(wrapped.to_string(), "open /dev/ttyUSB0");
    }

    struct Counter { left: u32 }

    #[async_trait::async_trait]
    impl TelemetrySource for Counter {
        fn kind(&self) -> SourceKind { SourceKind::Simulated }
        async fn next_sample(&mut self) -> Option<TelemetrySample> {
            if self.left == 0 { return None; }
            self.left -= 1;
            let mut s = sample();
            s.speed = self.left as i32;
            Some(s)
        }
    }

    #[tokio::test]
    async fn run_forwards_in_order_until_end() {
        let (tx, rx) = channel();
        let mut src = Counter { left: 3 };
        src.run(tx).await.unwrap();
        let speeds: Vec<i32> = rx.iter().map(|s| s.speed).collect();
        assert_eq!(speeds, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn run_stops_when_consumer_is_gone() {
        let (tx, rx) = channel();
        drop(rx);
        let mut src = Counter { left: 1000 };
        src.run(tx).await.unwrap();
        assert_eq!(src.left, 999);
    }
}
