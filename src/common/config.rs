//! Configuration for a `Locker` instance

use crate::common::utils::parse_duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

/// Environment prefix for overrides (e.g. `MINILOCK_HEARTBEAT_INTERVAL=30s`)
pub const ENV_PREFIX: &str = "MINILOCK";

/// Longest accepted heartbeat interval
pub const MAX_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(86_400);

/// Locker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerConfig {
    /// Lock table; records are namespaced by it inside the backend
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Upper bound for the renewal interval
    #[serde(
        default = "default_heartbeat_interval",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub heartbeat_interval: Duration,

    /// Renew held leases in the background
    #[serde(default = "default_heartbeat_enabled")]
    pub heartbeat_enabled: bool,

    /// Buffered fault notifications per subscriber
    #[serde(default = "default_fault_capacity")]
    pub fault_capacity: usize,
}

fn default_table_name() -> String {
    "locks".to_string()
}
fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_heartbeat_enabled() -> bool {
    true
}
fn default_fault_capacity() -> usize {
    64
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            heartbeat_interval: default_heartbeat_interval(),
            heartbeat_enabled: default_heartbeat_enabled(),
            fault_capacity: default_fault_capacity(),
        }
    }
}

impl LockerConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Leases are never renewed; they lapse after their duration.
    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat_enabled = false;
        self
    }

    pub fn with_fault_capacity(mut self, capacity: usize) -> Self {
        self.fault_capacity = capacity;
        self
    }

    /// Load from a TOML (or any `config`-supported) file, then apply
    /// `MINILOCK_*` environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let loaded = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;
        let conf: Self = loaded.try_deserialize()?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.table_name.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "table_name cannot be empty".into(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(crate::Error::InvalidConfig(
                "heartbeat_interval must be positive".into(),
            ));
        }
        if self.heartbeat_interval > MAX_HEARTBEAT_INTERVAL {
            return Err(crate::Error::InvalidConfig(format!(
                "heartbeat_interval must be at most {:?}",
                MAX_HEARTBEAT_INTERVAL
            )));
        }
        if self.fault_capacity == 0 {
            return Err(crate::Error::InvalidConfig(
                "fault_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{}ms", d.as_millis()))
}

fn deserialize_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    match Raw::deserialize(d)? {
        Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
        Raw::Text(s) => parse_duration(&s).map_err(serde::de::Error::custom),
    }
}
