//! Leased locks with heartbeat renewal
//!
//! `Locker` is the public facade. `acquire` runs the conditional put on the
//! caller's task, racing freely with every other acquirer; only the
//! bookkeeping that follows a success crosses into the coordinator task,
//! which is the single owner of the held-lock set.
//!
//! Per lock name, as seen by one locker:
//!
//! ```text
//!   Unheld ──acquire ok──▶ Held ──release / renewal lost / shutdown──▶ Unheld
//!                          │  ▲
//!                          └──┘ heartbeat renewal
//! ```

mod coordinator;
pub mod fault;
mod lease;

pub use fault::{FaultKind, LockFault};

use crate::backend::StoreBackend;
use crate::common::{validate_key, validate_lease, Error, LockerConfig, Result};
use coordinator::{Command, Coordinator, COMMAND_BUFFER};
use lease::LeaseClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Distributed lock client for one owner identity.
///
/// Construction spawns the coordinator task, so it must happen inside a
/// tokio runtime. Cancelling the parent token, calling [`Locker::close`], or
/// dropping the locker makes the coordinator release every held lock
/// (best effort) and stop.
pub struct Locker {
    client: LeaseClient,
    commands: mpsc::Sender<Command>,
    faults: broadcast::Sender<LockFault>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Locker {
    /// Locker with default heartbeat settings on `table_name`.
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        parent: &CancellationToken,
        table_name: impl Into<String>,
    ) -> Self {
        Self::start(backend, parent, LockerConfig::new(table_name))
    }

    pub fn with_config(
        backend: Arc<dyn StoreBackend>,
        parent: &CancellationToken,
        config: LockerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::start(backend, parent, config))
    }

    fn start(backend: Arc<dyn StoreBackend>, parent: &CancellationToken, config: LockerConfig) -> Self {
        let owner_id = uuid::Uuid::new_v4().to_string();
        let client = LeaseClient::new(backend, config.table_name, owner_id);
        let cancel = parent.child_token();
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let (faults, _) = broadcast::channel(config.fault_capacity.max(1));

        let task = Coordinator::new(
            client.clone(),
            config.heartbeat_interval,
            config.heartbeat_enabled,
            faults.clone(),
        )
        .spawn(rx, cancel.clone());

        Self {
            client,
            commands,
            faults,
            cancel,
            task,
        }
    }

    /// Opaque id written into every record this locker owns
    pub fn owner_id(&self) -> &str {
        self.client.owner_id()
    }

    pub fn table_name(&self) -> &str {
        self.client.table()
    }

    /// Try to take (or renew) the lease on `name` for `lease`.
    ///
    /// Returns `Ok(false)` when another owner holds an unexpired lease; this
    /// is an expected outcome, not an error. There is no retry: loop with
    /// your own backoff if you need to wait for the lock.
    pub async fn acquire(&self, name: &str, lease: Duration) -> Result<bool> {
        validate_key(name)?;
        validate_lease(lease)?;
        if self.cancel.is_cancelled() {
            return Err(Error::Closed);
        }

        debug!(
            locker = %self.owner_id(),
            lock = name,
            lease_ms = lease.as_millis() as u64,
            "Attempting to acquire lock"
        );
        if !self.client.acquire(name, lease).await? {
            debug!(locker = %self.owner_id(), lock = name, "Lock held by another owner");
            return Ok(false);
        }

        let (done, recorded) = oneshot::channel();
        let cmd = Command::Record {
            name: name.to_string(),
            lease,
            done,
        };
        let tracked = match self.commands.send(cmd).await {
            Ok(()) => recorded.await.unwrap_or(false),
            Err(_) => false,
        };

        if !tracked {
            // Nobody would renew or release it; don't leave it behind.
            if let Err(e) = self.client.release(name).await {
                warn!(locker = %self.owner_id(), lock = name, error = %e, "Failed to drop record after shutdown");
            }
            return Err(Error::Closed);
        }

        Ok(true)
    }

    /// Give up `name` and stop renewing it.
    ///
    /// Returns once the coordinator has processed the release. A release that
    /// the backend rejects (the lock was not ours any more) or fails is
    /// reported on the fault channel, see [`Locker::subscribe_faults`].
    pub async fn release(&self, name: &str) {
        let (done, released) = oneshot::channel();
        let cmd = Command::Release {
            name: name.to_string(),
            done,
        };
        if self.commands.send(cmd).await.is_err() {
            debug!(locker = %self.owner_id(), lock = name, "Release after shutdown; already drained");
            return;
        }
        let _ = released.await;
    }

    /// Stream of renewal and release failures.
    ///
    /// Each fault means this locker believed it held a lock it did not (or
    /// could no longer prove it did); the lock has already been dropped from
    /// the held set.
    pub fn subscribe_faults(&self) -> broadcast::Receiver<LockFault> {
        self.faults.subscribe()
    }

    /// Names currently tracked (and renewed) by this locker
    pub async fn held_locks(&self) -> Result<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Held { reply })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Current renewal interval
    pub async fn heartbeat_interval(&self) -> Result<Duration> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Interval { reply })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.task.is_finished()
    }

    /// Ask the coordinator to drain and stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Release every held lock and stop the coordinator.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(locker = %self.client.owner_id(), error = %e, "Coordinator task ended abnormally");
        }
    }
}

impl std::fmt::Debug for Locker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locker")
            .field("owner_id", &self.owner_id())
            .field("table", &self.table_name())
            .field("closed", &self.is_closed())
            .finish()
    }
}
