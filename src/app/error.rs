use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitaError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse failure: {0}")]
    ParseFailure(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for GitaError {
    fn from(e: serde_json::Error) -> Self {
        GitaError::ParseFailure(e.to_string())
    }
}

impl From<reqwest::Error> for GitaError {
    fn from(e: reqwest::Error) -> Self {
        GitaError::NetworkFailure(e.to_string())
    }
}

impl From<crate::config::ConfigError> for GitaError {
    fn from(e: crate::config::ConfigError) -> Self {
        GitaError::Config(e.to_string())
    }
}

impl GitaError {
    /// Wraps a non-SQLite storage problem (poisoned lock, failed migration)
    /// so it surfaces as `StoreUnavailable`.
    pub fn store(msg: impl Into<String>) -> Self {
        GitaError::StoreUnavailable(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some(msg.into()),
        ))
    }
}

pub type Result<T> = std::result::Result<T, GitaError>;
