//! Acquire / renew / release protocol against the backend

use crate::backend::{record_key, DeleteOutcome, PutOutcome, StoreBackend};
use crate::common::{expiry_after, Result};
use std::sync::Arc;
use std::time::Duration;

/// Backend handle bound to one owner id and one lock table.
///
/// Shared by the facade (fresh acquisitions on the caller's task) and the
/// coordinator (renewals and releases).
#[derive(Clone)]
pub(crate) struct LeaseClient {
    backend: Arc<dyn StoreBackend>,
    table: String,
    owner_id: String,
}

impl LeaseClient {
    pub(crate) fn new(backend: Arc<dyn StoreBackend>, table: String, owner_id: String) -> Self {
        Self {
            backend,
            table,
            owner_id,
        }
    }

    pub(crate) fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub(crate) fn table(&self) -> &str {
        &self.table
    }

    /// Take or extend the lease on `name` until now + `lease`.
    ///
    /// `Ok(false)` means another owner holds an unexpired record.
    pub(crate) async fn acquire(&self, name: &str, lease: Duration) -> Result<bool> {
        let key = record_key(&self.table, name);
        let expires_at = expiry_after(lease)?;
        let outcome = self
            .backend
            .conditional_put(&key, &self.owner_id, expires_at)
            .await?;
        Ok(outcome == PutOutcome::Acquired)
    }

    pub(crate) async fn release(&self, name: &str) -> Result<DeleteOutcome> {
        let key = record_key(&self.table, name);
        self.backend.conditional_delete(&key, &self.owner_id).await
    }
}
