//! Remote store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} — {body}")]
    Api { status: u16, body: String },

    #[error("invalid property '{property}': {reason}")]
    InvalidProperty { property: String, reason: String },

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("rejected by store: {0}")]
    Rejected(String),
}

impl StoreError {
    pub(crate) fn invalid(property: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidProperty {
            property: property.to_string(),
            reason: reason.into(),
        }
    }
}
