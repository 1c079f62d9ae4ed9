//! Sled backend
//!
//! Records are bincode-encoded and written with sled's compare-and-swap, so
//! the conditional checks hold for every handle on the same `sled::Db`.

use super::{DeleteOutcome, LockRecord, PutOutcome, StoreBackend};
use crate::common::{timestamp_now, Result};
use async_trait::async_trait;
use sled::IVec;
use std::path::Path;

pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    /// Open or create a lock store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    pub fn from_db(db: sled::Db) -> Self {
        Self { db }
    }

    /// Current record for `key`, expired or not
    pub fn get(&self, key: &str) -> Result<Option<LockRecord>> {
        self.db
            .get(key)?
            .map(|raw| decode(&raw))
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

fn decode(raw: &[u8]) -> Result<LockRecord> {
    Ok(bincode::deserialize(raw)?)
}

#[async_trait]
impl StoreBackend for SledBackend {
    async fn conditional_put(&self, key: &str, owner: &str, expires_at: u64) -> Result<PutOutcome> {
        let encoded = bincode::serialize(&LockRecord::new(key, owner, expires_at))?;

        let outcome = loop {
            let current = self.db.get(key)?;
            if let Some(raw) = &current {
                if !decode(raw)?.admits(owner, timestamp_now()) {
                    break PutOutcome::Contended;
                }
            }

            match self.db.compare_and_swap(key, current, Some(encoded.clone()))? {
                Ok(()) => break PutOutcome::Acquired,
                // Another writer got in between the read and the swap.
                Err(_) => continue,
            }
        };

        if outcome == PutOutcome::Acquired {
            self.db.flush_async().await?;
        }
        Ok(outcome)
    }

    async fn conditional_delete(&self, key: &str, owner: &str) -> Result<DeleteOutcome> {
        let outcome = loop {
            let Some(raw) = self.db.get(key)? else {
                break DeleteOutcome::Contended;
            };
            if decode(&raw)?.owner_id != owner {
                break DeleteOutcome::Contended;
            }

            match self.db.compare_and_swap(key, Some(raw), None::<IVec>)? {
                Ok(()) => break DeleteOutcome::Deleted,
                Err(_) => continue,
            }
        };

        if outcome == DeleteOutcome::Deleted {
            self.db.flush_async().await?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_ownership() {
        let dir = TempDir::new().unwrap();
        let backend = SledBackend::open(dir.path()).unwrap();
        let expiry = timestamp_now() + 60;

        assert_eq!(
            backend.conditional_put("locks/a", "x", expiry).await.unwrap(),
            PutOutcome::Acquired
        );
        assert_eq!(
            backend.conditional_put("locks/a", "y", expiry).await.unwrap(),
            PutOutcome::Contended
        );
        assert_eq!(
            backend.get("locks/a").unwrap(),
            Some(LockRecord::new("locks/a", "x", expiry))
        );

        assert_eq!(
            backend.conditional_delete("locks/a", "y").await.unwrap(),
            DeleteOutcome::Contended
        );
        assert_eq!(
            backend.conditional_delete("locks/a", "x").await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert!(backend.is_empty());
    }
}
