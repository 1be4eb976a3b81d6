use simtel_ingest_core::TelemetrySample;
use std::collections::HashMap;
use std::str::FromStr;
use time::OffsetDateTime;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum SerialLineError {
    #[error("empty line")]
    Empty,
    #[error("pair without '=': {0:?}")]
    MissingEquals(String),
    #[error("duplicate key {0}")]
    DuplicateKey(String),
    #[error("missing required key {0}")]
    MissingKey(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Parse `Speed=<int>,RPM=<int>,Gear=<int>[,Throttle=<f>][,Brake=<f>]`,
/// stamping the sample with the current time.
pub fn parse_line(line: &str) -> Result<TelemetrySample, SerialLineError> {
    parse_line_at(line, OffsetDateTime::now_utc())
}

/// Pairs may come in any order. Keys are case-sensitive and unknown keys are
/// ignored; Throttle and Brake default to 0.
pub fn parse_line_at(line: &str, timestamp: OffsetDateTime) -> Result<TelemetrySample, SerialLineError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(SerialLineError::Empty);
    }

    let mut fields = HashMap::new();
    for pair in line.split(',') {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| SerialLineError::MissingEquals(pair.trim().to_string()))?;
        let key = key.trim();
        if fields.insert(key, value.trim()).is_some() {
            return Err(SerialLineError::DuplicateKey(key.to_string()));
        }
    }

    Ok(TelemetrySample {
        speed: required(&fields, "Speed")?,
        rpm: required(&fields, "RPM")?,
        gear: required(&fields, "Gear")?,
        throttle: optional(&fields, "Throttle")?,
        brake: optional(&fields, "Brake")?,
        timestamp,
    })
}

fn required<T: FromStr>(fields: &HashMap<&str, &str>, key: &'static str) -> Result<T, SerialLineError> {
    let raw = fields.get(key).ok_or(SerialLineError::MissingKey(key))?;
    convert(key, raw)
}

fn optional(fields: &HashMap<&str, &str>, key: &'static str) -> Result<f64, SerialLineError> {
    match fields.get(key) {
        Some(raw) => convert(key, raw),
        None => Ok(0.0),
    }
}

fn convert<T: FromStr>(key: &'static str, raw: &str) -> Result<T, SerialLineError> {
    raw.parse().map_err(|_| SerialLineError::InvalidValue { key, value: raw.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const AT: OffsetDateTime = datetime!(2024-03-01 10:00:00 UTC);

    #[test]
    fn parses_full_line() {
        let s = parse_line_at("Speed=180,RPM=6000,Gear=4,Throttle=0.5,Brake=0.1", AT).unwrap();
        assert_eq!((s.speed, s.rpm, s.gear), (180, 6000, 4));
        assert_eq!((s.throttle, s.brake), (0.5, 0.1));
        assert_eq!(s.timestamp, AT);
    }

    #[test]
    fn optional_fields_default_to_zero() {
        let s = parse_line_at("Speed=90,RPM=3000,Gear=2", AT).unwrap();
        assert_eq!(s.throttle, 0.0);
        assert_eq!(s.brake, 0.0);
    }

    #[test]
    fn order_and_whitespace_do_not_matter() {
        let s = parse_line_at(" Gear=3 , Brake=0.25,RPM=4100 ,Speed=120\r\n", AT).unwrap();
        assert_eq!((s.speed, s.rpm, s.gear, s.brake), (120, 4100, 3, 0.25));
    }

    #[test]
    fn out_of_range_values_are_kept() {
        let s = parse_line_at("Speed=-10,RPM=12000,Gear=9,Throttle=1.5", AT).unwrap();
        assert_eq!((s.speed, s.gear, s.throttle), (-10, 9, 1.5));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let s = parse_line_at("Speed=1,RPM=2,Gear=3,Fuel=40", AT).unwrap();
        assert_eq!(s.speed, 1);
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert_eq!(parse_line_at("", AT), Err(SerialLineError::Empty));
        assert_eq!(parse_line_at("  \n", AT), Err(SerialLineError::Empty));
        assert_eq!(parse_line_at("RPM=1,Gear=2", AT), Err(SerialLineError::MissingKey("Speed")));
        assert_eq!(parse_line_at("speed=1,RPM=1,Gear=2", AT), Err(SerialLineError::MissingKey("Speed")));
        assert_eq!(
            parse_line_at("Speed=1,RPM,Gear=2", AT),
            Err(SerialLineError::MissingEquals("RPM".into()))
        );
        assert_eq!(
            parse_line_at("Speed=1,Speed=2,RPM=1,Gear=2", AT),
            Err(SerialLineError::DuplicateKey("Speed".into()))
        );
        assert_eq!(
            parse_line_at("Speed=fast,RPM=1,Gear=2", AT),
            Err(SerialLineError::InvalidValue { key: "Speed", value: "fast".into() })
        );
        assert_eq!(
            parse_line_at("Speed=1,RPM=1,Gear=2,Brake=hard", AT),
            Err(SerialLineError::InvalidValue { key: "Brake", value: "hard".into() })
        );
        assert!(parse_line_at("Speed=1.5,RPM=1,Gear=2", AT).is_err());
    }
}
