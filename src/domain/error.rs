// Error types shared by every layer
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnlightenError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("session expired or not logged in")]
    AuthenticationExpired,

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("malformed portal payload: {0}")]
    Payload(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, EnlightenError>;
