//! Utility functions for minilock

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Percent-encoding set for table names (includes /, %, and control chars)
const KEY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'%')
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'&');

/// Shortest lease accepted; expiry has whole-second resolution.
pub const MIN_LEASE: Duration = Duration::from_secs(1);

/// Encode a key component so it can't contain the `/` separator
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

/// Parse duration string (e.g., "500ms", "30s", "5m", "1h", "7d").
///
/// A bare number is read as milliseconds.
pub fn parse_duration(s: &str) -> crate::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        let millis: u64 = s
            .parse()
            .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;
        return Ok(Duration::from_millis(millis));
    }

    let (num_str, unit) = match s.strip_suffix("ms") {
        Some(num) => (num, "ms"),
        None => s.split_at(s.len() - s.chars().last().map_or(0, char::len_utf8)),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let scale = match unit {
        "ms" => return Ok(Duration::from_millis(num)),
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    num.checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| crate::Error::InvalidConfig(format!("duration out of range: {}", s)))
}

/// Get current Unix timestamp (seconds)
pub fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Absolute expiry (Unix seconds) of a lease taken now
pub fn expiry_after(lease: Duration) -> crate::Result<u64> {
    let expiry = SystemTime::now()
        .checked_add(lease)
        .ok_or_else(|| crate::Error::InvalidLease(format!("lease {:?} is out of range", lease)))?;
    Ok(expiry
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0))
}

/// Validate lock name (must be non-empty, reasonable length)
pub fn validate_key(key: &str) -> crate::Result<()> {
    if key.is_empty() {
        return Err(crate::Error::InvalidKey("lock name cannot be empty".into()));
    }

    if key.len() > 1024 {
        return Err(crate::Error::InvalidKey(
            "lock name too long (max 1024 bytes)".into(),
        ));
    }

    if key.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidKey(
            "lock name contains invalid characters".into(),
        ));
    }

    Ok(())
}

/// Validate a lease duration
pub fn validate_lease(lease: Duration) -> crate::Result<()> {
    if lease < MIN_LEASE {
        return Err(crate::Error::InvalidLease(format!(
            "lease must be at least {:?}, got {:?}",
            MIN_LEASE, lease
        )));
    }
    expiry_after(lease).map(|_| ())
}
