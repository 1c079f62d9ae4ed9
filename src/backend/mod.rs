//! Conditional-write backends for lock records
//!
//! A backend only has to offer two atomic operations keyed by a string:
//! a conditional put that succeeds when the key is free, already ours, or
//! expired, and a conditional delete that succeeds only for the owner.
//! Every guarantee the locker makes rests on these being linearizable
//! across all clients sharing the store.

pub mod memory;
#[cfg(feature = "sled-backend")]
pub mod sled_store;

pub use memory::MemoryBackend;
#[cfg(feature = "sled-backend")]
pub use sled_store::SledBackend;

use crate::common::{encode_key, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Persisted ownership of one lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Backend key (table-qualified lock name)
    pub name: String,
    /// Owner id of the locker holding the lease
    pub owner_id: String,
    /// Absolute expiry, Unix seconds
    pub expires_at: u64,
}

impl LockRecord {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>, expires_at: u64) -> Self {
        Self {
            name: name.into(),
            owner_id: owner_id.into(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expires_at
    }

    /// Can `owner` take or renew this record at `now`?
    pub fn admits(&self, owner: &str, now: u64) -> bool {
        self.owner_id == owner || self.is_expired_at(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Acquired,
    /// A live record belongs to another owner; nothing was written.
    Contended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The record is missing or owned by someone else; nothing was removed.
    Contended,
}

/// Atomic conditional-write primitive consumed by the locker
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Write `{key, owner, expires_at}` if the key is absent, owned by
    /// `owner`, or expired.
    async fn conditional_put(&self, key: &str, owner: &str, expires_at: u64) -> Result<PutOutcome>;

    /// Remove the record for `key` only if `owner` holds it.
    async fn conditional_delete(&self, key: &str, owner: &str) -> Result<DeleteOutcome>;
}

/// Backend key for `name` inside `table`
pub fn record_key(table: &str, name: &str) -> String {
    format!("{}/{}", encode_key(table), name)
}
