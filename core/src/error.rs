use crate::types::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Initialization feed is empty; expected a D/T configuration record")]
    EmptyInitFeed,

    #[error("Configuration field '{field}' missing from the first initialization record")]
    MissingConfig { field: &'static str },

    #[error("Configuration field '{field}' has invalid value {value}")]
    InvalidConfig { field: &'static str, value: String },

    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("No friendship between '{a}' and '{b}'")]
    EdgeNotFound { a: UserId, b: UserId },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DetectorError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord { reason: reason.into() }
    }
}

pub type DetectorResult<T> = Result<T, DetectorError>;
