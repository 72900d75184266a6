//! Detector configuration: neighborhood depth D and window size T.
//!
//! Both values arrive in the first record of the initialization feed,
//! e.g. `{"D":"3", "T":"50"}`. A run cannot start without them, so this
//! is the one place where a bad record is fatal.

use crate::{
    error::{DetectorError, DetectorResult},
    event::Record,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Hop limit for the friend neighborhood (D).
    pub depth: usize,
    /// Purchases kept per user, and per neighborhood evaluation (T).
    pub window: usize,
}

impl DetectorConfig {
    pub fn new(depth: usize, window: usize) -> DetectorResult<Self> {
        if window == 0 {
            return Err(DetectorError::InvalidConfig {
                field: "T",
                value: "0".into(),
            });
        }
        Ok(Self { depth, window })
    }

    /// Read D and T from the leading initialization record.
    pub fn from_init_record(record: &Record) -> DetectorResult<Self> {
        let depth = read_count(record, "D")?;
        let window = read_count(record, "T")?;
        Self::new(depth, window)
    }
}

/// Non-negative integer field, given either as a JSON number or as a
/// numeric string (the feed writes `"D":"3"`).
fn read_count(record: &Record, field: &'static str) -> DetectorResult<usize> {
    let value = record
        .get(field)
        .ok_or(DetectorError::MissingConfig { field })?;

    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| DetectorError::InvalidConfig {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn reads_string_encoded_parameters() {
        let config = DetectorConfig::from_init_record(&record(json!({"D": "3", "T": "50"})))
            .expect("valid config");
        assert_eq!(config, DetectorConfig { depth: 3, window: 50 });
    }

    #[test]
    fn reads_numeric_parameters() {
        let config = DetectorConfig::from_init_record(&record(json!({"D": 0, "T": 1})))
            .expect("valid config");
        assert_eq!(config.depth, 0);
        assert_eq!(config.window, 1);
    }

    #[test]
    fn missing_window_is_fatal() {
        let err = DetectorConfig::from_init_record(&record(json!({"D": "2"}))).unwrap_err();
        assert!(matches!(err, DetectorError::MissingConfig { field: "T" }));
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = DetectorConfig::from_init_record(&record(json!({"D": "1", "T": "0"}))).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidConfig { field: "T", .. }));
    }

    #[test]
    fn negative_or_textual_depth_is_rejected() {
        for bad in [json!("-1"), json!("three"), json!(1.5), json!(null)] {
            let err = DetectorConfig::from_init_record(&record(json!({"D": bad.clone(), "T": "5"})))
                .unwrap_err();
            assert!(
                matches!(err, DetectorError::InvalidConfig { field: "D", .. }),
                "unexpected error for D={bad}: {err}"
            );
        }
    }
}
