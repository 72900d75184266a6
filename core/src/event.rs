//! Feed events and the flagged-purchase record the detector emits.
//!
//! Records arrive as flat JSON objects. The discriminator is
//! `event_type` (`eventType` is accepted too); numeric fields may be
//! JSON numbers or numeric strings. Unknown event types are not errors:
//! `Event::from_record` returns `Ok(None)` and the caller moves on.

use crate::{
    error::{DetectorError, DetectorResult},
    stats::NeighborhoodStats,
    types::{Timestamp, UserId},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A raw feed record. Field order is preserved so flagged output
/// repeats the original fields in the order they arrived.
pub type Record = Map<String, Value>;

const TYPE_FIELDS: [&str; 2] = ["event_type", "eventType"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Purchase,
    Befriend,
    Unfriend,
}

impl EventKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "purchase" => Some(Self::Purchase),
            "befriend" => Some(Self::Befriend),
            "unfriend" => Some(Self::Unfriend),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Befriend => "befriend",
            Self::Unfriend => "unfriend",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub user: UserId,
    pub amount: f64,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Purchase(Purchase),
    Befriend { id1: UserId, id2: UserId },
    Unfriend { id1: UserId, id2: UserId },
}

impl Event {
    pub fn purchase(user: impl Into<UserId>, amount: f64, timestamp: impl Into<Timestamp>) -> Self {
        Self::Purchase(Purchase {
            user: user.into(),
            amount,
            timestamp: timestamp.into(),
        })
    }

    pub fn befriend(id1: impl Into<UserId>, id2: impl Into<UserId>) -> Self {
        Self::Befriend { id1: id1.into(), id2: id2.into() }
    }

    pub fn unfriend(id1: impl Into<UserId>, id2: impl Into<UserId>) -> Self {
        Self::Unfriend { id1: id1.into(), id2: id2.into() }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Purchase(_) => EventKind::Purchase,
            Self::Befriend { .. } => EventKind::Befriend,
            Self::Unfriend { .. } => EventKind::Unfriend,
        }
    }

    /// Parse a feed record. `Ok(None)` means an unrecognized event type.
    pub fn from_record(record: &Record) -> DetectorResult<Option<Self>> {
        let tag = TYPE_FIELDS
            .iter()
            .find_map(|field| record.get(*field))
            .ok_or_else(|| DetectorError::malformed("missing event_type"))?;
        let tag = tag
            .as_str()
            .ok_or_else(|| DetectorError::malformed(format!("event_type is not a string: {tag}")))?;

        let Some(kind) = EventKind::from_tag(tag) else {
            return Ok(None);
        };

        let event = match kind {
            EventKind::Purchase => Self::Purchase(Purchase {
                user: read_id(record, "id")?,
                amount: read_amount(record)?,
                timestamp: read_timestamp(record)?,
            }),
            EventKind::Befriend => Self::Befriend {
                id1: read_id(record, "id1")?,
                id2: read_id(record, "id2")?,
            },
            EventKind::Unfriend => Self::Unfriend {
                id1: read_id(record, "id1")?,
                id2: read_id(record, "id2")?,
            },
        };
        Ok(Some(event))
    }

    /// Render the event back into a feed record, in feed field order.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("event_type".into(), Value::from(self.kind().as_str()));
        match self {
            Self::Purchase(p) => {
                let timestamp = match &p.timestamp {
                    Timestamp::Numeric(n) => Value::from(*n),
                    Timestamp::Text(s) => Value::from(s.as_str()),
                };
                record.insert("timestamp".into(), timestamp);
                record.insert("id".into(), Value::from(p.user.as_str()));
                record.insert("amount".into(), Value::from(format!("{:.2}", p.amount)));
            }
            Self::Befriend { id1, id2 } | Self::Unfriend { id1, id2 } => {
                record.insert("id1".into(), Value::from(id1.as_str()));
                record.insert("id2".into(), Value::from(id2.as_str()));
            }
        }
        record
    }
}

fn read_id(record: &Record, field: &str) -> DetectorResult<UserId> {
    match record.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(DetectorError::malformed(format!("{field} is not an identifier: {other}"))),
        None => Err(DetectorError::malformed(format!("missing {field}"))),
    }
}

fn read_amount(record: &Record) -> DetectorResult<f64> {
    let amount = match record.get("amount") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
        None => return Err(DetectorError::malformed("missing amount")),
    };
    match amount {
        Some(a) if a.is_finite() && a >= 0.0 => Ok(a),
        _ => Err(DetectorError::malformed(format!(
            "amount is not a non-negative number: {}",
            record.get("amount").map(Value::to_string).unwrap_or_default()
        ))),
    }
}

fn read_timestamp(record: &Record) -> DetectorResult<Timestamp> {
    match record.get("timestamp") {
        Some(Value::String(s)) if !s.is_empty() => Ok(Timestamp::Text(s.clone())),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Timestamp::Numeric)
            .ok_or_else(|| DetectorError::malformed(format!("timestamp is not an integer: {n}"))),
        Some(other) => Err(DetectorError::malformed(format!("bad timestamp: {other}"))),
        None => Err(DetectorError::malformed("missing timestamp")),
    }
}

/// A purchase that exceeded its neighborhood's `mean + 3 * sd`.
///
/// Serializes as the original record's fields followed by `mean` and
/// `sd`, both formatted to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedPurchase {
    #[serde(flatten)]
    pub record: Record,
    pub mean: String,
    pub sd: String,
}

impl FlaggedPurchase {
    pub fn new(record: &Record, stats: &NeighborhoodStats) -> Self {
        let mut record = record.clone();
        record.shift_remove("mean");
        record.shift_remove("sd");
        Self {
            record,
            mean: format!("{:.2}", stats.mean),
            sd: format!("{:.2}", stats.std_dev),
        }
    }

    /// A field of the original record as text (ids may be numbers).
    pub fn field_text(&self, key: &str) -> Option<String> {
        match self.record.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn user(&self) -> Option<String> {
        self.field_text("id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn parses_string_encoded_purchase() {
        let rec = record(json!({
            "event_type": "purchase",
            "timestamp": "2017-06-13 11:33:01",
            "id": "1",
            "amount": "16.83"
        }));
        let event = Event::from_record(&rec).unwrap().unwrap();
        assert_eq!(event, Event::purchase("1", 16.83, "2017-06-13 11:33:01"));
    }

    #[test]
    fn accepts_camel_case_tag_and_numeric_fields() {
        let rec = record(json!({"eventType": "befriend", "id1": 1, "id2": 2}));
        let event = Event::from_record(&rec).unwrap().unwrap();
        assert_eq!(event, Event::befriend("1", "2"));

        let rec = record(json!({"eventType": "purchase", "id": 7, "amount": 3, "timestamp": 42}));
        let event = Event::from_record(&rec).unwrap().unwrap();
        assert_eq!(event, Event::purchase("7", 3.0, 42i64));
    }

    #[test]
    fn unknown_event_type_is_ignored() {
        let rec = record(json!({"event_type": "poke", "id1": "1", "id2": "2"}));
        assert!(Event::from_record(&rec).unwrap().is_none());
    }

    #[test]
    fn negative_or_missing_amount_is_malformed() {
        for rec in [
            json!({"event_type": "purchase", "id": "1", "timestamp": "t", "amount": "-4"}),
            json!({"event_type": "purchase", "id": "1", "timestamp": "t", "amount": "NaN"}),
            json!({"event_type": "purchase", "id": "1", "timestamp": "t"}),
        ] {
            let err = Event::from_record(&record(rec)).unwrap_err();
            assert!(matches!(err, DetectorError::MalformedRecord { .. }));
        }
    }

    #[test]
    fn flagged_purchase_keeps_field_order_and_appends_stats() {
        let rec = record(json!({
            "event_type": "purchase",
            "timestamp": "2017-06-13 11:33:02",
            "id": "2",
            "amount": "1601.83"
        }));
        let stats = NeighborhoodStats { count: 2, mean: 29.1, std_dev: 19.784 };
        let flag = FlaggedPurchase::new(&rec, &stats);
        let line = serde_json::to_string(&flag).unwrap();
        assert_eq!(
            line,
            r#"{"event_type":"purchase","timestamp":"2017-06-13 11:33:02","id":"2","amount":"1601.83","mean":"29.10","sd":"19.78"}"#
        );
        assert_eq!(flag.user().as_deref(), Some("2"));
    }

    #[test]
    fn existing_stats_fields_are_replaced_without_reordering() {
        let rec = record(json!({
            "event_type": "purchase",
            "mean": "stale",
            "timestamp": "2017-06-13 11:33:02",
            "id": "2",
            "amount": "50"
        }));
        let stats = NeighborhoodStats { count: 2, mean: 15.0, std_dev: 5.0 };
        let line = serde_json::to_string(&FlaggedPurchase::new(&rec, &stats)).unwrap();
        assert_eq!(
            line,
            r#"{"event_type":"purchase","timestamp":"2017-06-13 11:33:02","id":"2","amount":"50","mean":"15.00","sd":"5.00"}"#
        );
    }
}
