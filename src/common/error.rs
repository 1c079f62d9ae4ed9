//! Error types for minilock

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Backend Errors ===
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend throttled: {0}")]
    Throttled(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record codec error: {0}")]
    Codec(String),

    // === Lock Errors ===
    #[error("Invalid lock name: {0}")]
    InvalidKey(String),

    #[error("Invalid lease: {0}")]
    InvalidLease(String),

    #[error("Locker is closed")]
    Closed,

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config load error: {0}")]
    Config(#[from] config::ConfigError),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Is this a transient backend failure worth another attempt?
    ///
    /// The library never retries on its own; callers looping on
    /// `Locker::acquire` can use this to pick their backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Throttled(_) | Error::Unavailable(_) | Error::Timeout(_)
        )
    }

    /// Did the failure come from the store rather than from local validation?
    pub fn is_backend(&self) -> bool {
        match self {
            Error::Backend(_)
            | Error::Throttled(_)
            | Error::Unavailable(_)
            | Error::AccessDenied(_)
            | Error::Timeout(_)
            | Error::Storage(_)
            | Error::Codec(_) => true,
            _ => false,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Backend(e.to_string())
    }
}

#[cfg(feature = "sled-backend")]
impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

#[cfg(feature = "sled-backend")]
impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}
