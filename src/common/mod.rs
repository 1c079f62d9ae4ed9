//! Common utilities and types shared across minilock

pub mod config;
pub mod error;
pub mod utils;

pub use config::LockerConfig;
pub use error::{Error, Result};
pub use utils::{encode_key, expiry_after, parse_duration, timestamp_now, validate_key, validate_lease};
