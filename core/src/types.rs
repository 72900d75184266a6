//! Shared primitive types used across the detector.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable, opaque user identifier as it appears in the feed.
pub type UserId = String;

/// Run-wide insertion sequence number. Assigned to every recorded
/// purchase so that equal timestamps still order deterministically.
pub type Seq = u64;

/// An event timestamp.
///
/// Feeds carry either integers or zero-padded `YYYY-MM-DD HH:MM:SS`
/// strings. Integers compare numerically, strings lexically. A single
/// feed is expected to use one form; across forms, numeric sorts first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Numeric(i64),
    Text(String),
}

impl From<&str> for Timestamp {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Timestamp {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self::Numeric(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}
