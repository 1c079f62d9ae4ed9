//! In-process backend
//!
//! Every operation runs under one mutex, which makes it linearizable for
//! all lockers sharing the same `MemoryBackend` (typically through an `Arc`).

use super::{DeleteOutcome, LockRecord, PutOutcome, StoreBackend};
use crate::common::{timestamp_now, Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, LockRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<String, LockRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::Internal("memory backend mutex poisoned".into()))
    }

    /// Current record for `key`, expired or not
    pub fn get(&self, key: &str) -> Result<Option<LockRecord>> {
        Ok(self.records()?.get(key).cloned())
    }

    /// Write a record unconditionally (operator override)
    pub fn insert(&self, record: LockRecord) -> Result<Option<LockRecord>> {
        Ok(self.records()?.insert(record.name.clone(), record))
    }

    /// Drop a record unconditionally (operator override)
    pub fn remove(&self, key: &str) -> Result<Option<LockRecord>> {
        Ok(self.records()?.remove(key))
    }

    pub fn len(&self) -> usize {
        self.records().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn conditional_put(&self, key: &str, owner: &str, expires_at: u64) -> Result<PutOutcome> {
        let now = timestamp_now();
        let mut records = self.records()?;

        if let Some(existing) = records.get(key) {
            if !existing.admits(owner, now) {
                return Ok(PutOutcome::Contended);
            }
        }

        records.insert(key.to_string(), LockRecord::new(key, owner, expires_at));
        Ok(PutOutcome::Acquired)
    }

    async fn conditional_delete(&self, key: &str, owner: &str) -> Result<DeleteOutcome> {
        let mut records = self.records()?;

        match records.get(key) {
            Some(existing) if existing.owner_id == owner => {
                records.remove(key);
                Ok(DeleteOutcome::Deleted)
            }
            _ => Ok(DeleteOutcome::Contended),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn far() -> u64 {
        timestamp_now() + 3600
    }

    #[tokio::test]
    async fn test_put_on_absent_key() {
        let backend = MemoryBackend::new();
        let outcome = backend.conditional_put("locks/a", "x", far()).await.unwrap();
        assert_eq!(outcome, PutOutcome::Acquired);
        assert_eq!(backend.get("locks/a").unwrap().unwrap().owner_id, "x");
    }

    #[tokio::test]
    async fn test_put_contended_and_renewed() {
        let backend = MemoryBackend::new();
        backend.conditional_put("locks/a", "x", far()).await.unwrap();

        let other = backend.conditional_put("locks/a", "y", far()).await.unwrap();
        assert_eq!(other, PutOutcome::Contended);
        assert_eq!(backend.get("locks/a").unwrap().unwrap().owner_id, "x");

        let expiry = far() + 60;
        let renewed = backend.conditional_put("locks/a", "x", expiry).await.unwrap();
        assert_eq!(renewed, PutOutcome::Acquired);
        assert_eq!(backend.get("locks/a").unwrap().unwrap().expires_at, expiry);
    }

    #[tokio::test]
    async fn test_put_takes_over_expired_record() {
        let backend = MemoryBackend::new();
        let past = timestamp_now() - 10;
        backend.conditional_put("locks/a", "x", past).await.unwrap();

        let outcome = backend.conditional_put("locks/a", "y", far()).await.unwrap();
        assert_eq!(outcome, PutOutcome::Acquired);
        assert_eq!(backend.get("locks/a").unwrap().unwrap().owner_id, "y");
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let backend = MemoryBackend::new();
        backend.conditional_put("locks/a", "x", far()).await.unwrap();

        let outcome = backend.conditional_delete("locks/a", "y").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Contended);
        assert_eq!(backend.len(), 1);

        let outcome = backend.conditional_delete("locks/a", "x").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(backend.is_empty());

        let outcome = backend.conditional_delete("locks/a", "x").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Contended);
    }

    #[tokio::test]
    async fn test_operator_overrides() {
        let backend = MemoryBackend::new();
        backend.conditional_put("locks/a", "x", far()).await.unwrap();

        let previous = backend
            .insert(LockRecord::new("locks/a", "intruder", far()))
            .unwrap();
        assert_eq!(previous.unwrap().owner_id, "x");
        assert_eq!(
            backend.conditional_put("locks/a", "x", far()).await.unwrap(),
            PutOutcome::Contended
        );

        assert!(backend.remove("locks/a").unwrap().is_some());
        assert!(backend.is_empty());
    }
}
