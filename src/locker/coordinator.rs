//! Coordinator task
//!
//! One task per `Locker` owns the set of held locks. Records, releases,
//! heartbeat renewals and introspection queries all arrive through a single
//! mpsc queue (plus the heartbeat ticker) and are handled one at a time, so
//! the set needs no lock of its own.

use super::fault::{FaultKind, LockFault};
use super::lease::LeaseClient;
use crate::backend::DeleteOutcome;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub(crate) const COMMAND_BUFFER: usize = 64;

pub(crate) enum Command {
    /// Track a freshly acquired lock. Replies `false` once shutting down.
    Record {
        name: String,
        lease: Duration,
        done: oneshot::Sender<bool>,
    },
    Release {
        name: String,
        done: oneshot::Sender<()>,
    },
    Held {
        reply: oneshot::Sender<Vec<String>>,
    },
    Interval {
        reply: oneshot::Sender<Duration>,
    },
}

pub(crate) struct Coordinator {
    client: LeaseClient,
    /// name -> lease duration
    held: BTreeMap<String, Duration>,
    max_interval: Duration,
    interval: Duration,
    /// Start of the latest renewal pass; the ticker is phased from it.
    last_renewal: Instant,
    heartbeat_enabled: bool,
    faults: broadcast::Sender<LockFault>,
}

impl Coordinator {
    pub(crate) fn new(
        client: LeaseClient,
        max_interval: Duration,
        heartbeat_enabled: bool,
        faults: broadcast::Sender<LockFault>,
    ) -> Self {
        Self {
            client,
            held: BTreeMap::new(),
            max_interval,
            interval: max_interval,
            last_renewal: Instant::now(),
            heartbeat_enabled,
            faults,
        }
    }

    pub(crate) fn spawn(
        self,
        commands: mpsc::Receiver<Command>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(commands, token))
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>, token: CancellationToken) {
        info!(
            locker = %self.client.owner_id(),
            table = %self.client.table(),
            interval_ms = self.interval.as_millis() as u64,
            heartbeat = self.heartbeat_enabled,
            "Coordinator started"
        );

        let mut ticker = heartbeat(self.last_renewal, self.interval);
        loop {
            let before = self.interval;
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick(), if self.heartbeat_enabled => {
                    debug!(locker = %self.client.owner_id(), held = self.held.len(), "Tick refresh");
                    self.renew_all().await;
                }
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    // Every Locker handle is gone.
                    None => break,
                },
            }
            if self.interval != before {
                // Every held lease was renewed at `last_renewal` or later,
                // so the next pass is due one interval after it.
                ticker = heartbeat(self.last_renewal, self.interval);
            }
        }

        self.shutdown(commands).await;
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Record { name, lease, done } => {
                debug!(
                    locker = %self.client.owner_id(),
                    lock = %name,
                    lease_ms = lease.as_millis() as u64,
                    "Lock record"
                );
                self.held.insert(name, lease);
                let _ = done.send(true);
                if self.retune() && self.heartbeat_enabled {
                    self.renew_all().await;
                }
            }
            Command::Release { name, done } => {
                debug!(locker = %self.client.owner_id(), lock = %name, "Lock release");
                self.release(&name).await;
                let _ = done.send(());
            }
            Command::Held { reply } => {
                let _ = reply.send(self.held.keys().cloned().collect());
            }
            Command::Interval { reply } => {
                let _ = reply.send(self.interval);
            }
        }
    }

    /// Recompute the heartbeat interval from the held leases.
    ///
    /// Any lease shorter than the configured interval pulls the interval down
    /// to half of the shortest such lease. Returns whether it shrank.
    fn retune(&mut self) -> bool {
        let target = match self.held.values().min() {
            Some(lease) if *lease < self.max_interval => *lease / 2,
            _ => self.max_interval,
        };

        let shrunk = target < self.interval;
        if target != self.interval {
            debug!(
                locker = %self.client.owner_id(),
                from_ms = self.interval.as_millis() as u64,
                interval_ms = target.as_millis() as u64,
                "Heartbeat interval adjusted"
            );
            self.interval = target;
        }
        shrunk
    }

    /// Re-run the conditional put for every held lock.
    async fn renew_all(&mut self) {
        self.last_renewal = Instant::now();
        let leases: Vec<(String, Duration)> = self
            .held
            .iter()
            .map(|(name, lease)| (name.clone(), *lease))
            .collect();

        let mut lost = false;
        for (name, lease) in leases {
            let kind = match self.client.acquire(&name, lease).await {
                Ok(true) => {
                    debug!(locker = %self.client.owner_id(), lock = %name, "Lease renewed");
                    continue;
                }
                Ok(false) => FaultKind::LeaseLost,
                Err(e) => FaultKind::RenewalFailed(e.to_string()),
            };
            self.held.remove(&name);
            self.report(name, kind);
            lost = true;
        }

        if lost {
            self.retune();
        }
    }

    async fn release(&mut self, name: &str) {
        let fault = match self.client.release(name).await {
            Ok(DeleteOutcome::Deleted) => None,
            Ok(DeleteOutcome::Contended) => Some(FaultKind::ReleaseRejected),
            Err(e) => Some(FaultKind::ReleaseFailed(e.to_string())),
        };

        // The caller gave the lock up either way; never renew it again.
        self.held.remove(name);
        self.retune();

        if let Some(kind) = fault {
            self.report(name.to_string(), kind);
        }
    }

    fn report(&self, lock: String, kind: FaultKind) {
        let fault = LockFault {
            locker: self.client.owner_id().to_string(),
            lock,
            kind,
        };
        error!(locker = %fault.locker, lock = %fault.lock, "Lock fault: {}", fault.kind);
        // No subscribers is fine; the fault is already logged.
        let _ = self.faults.send(fault);
    }

    /// Answer whatever is still queued, then release every held lock.
    async fn shutdown(mut self, mut commands: mpsc::Receiver<Command>) {
        commands.close();
        while let Ok(cmd) = commands.try_recv() {
            match cmd {
                // The acquirer cleans up its own record.
                Command::Record { done, .. } => {
                    let _ = done.send(false);
                }
                other => self.handle(other).await,
            }
        }

        let names: Vec<String> = std::mem::take(&mut self.held).into_keys().collect();
        info!(locker = %self.client.owner_id(), held = names.len(), "Coordinator draining");

        for name in names {
            match self.client.release(&name).await {
                Ok(DeleteOutcome::Deleted) => {
                    debug!(locker = %self.client.owner_id(), lock = %name, "Lock released on shutdown")
                }
                Ok(DeleteOutcome::Contended) => {
                    warn!(locker = %self.client.owner_id(), lock = %name, "Lock no longer owned at shutdown")
                }
                Err(e) => {
                    warn!(locker = %self.client.owner_id(), lock = %name, error = %e, "Lock release failed during shutdown")
                }
            }
        }

        info!(locker = %self.client.owner_id(), "Coordinator stopped");
    }
}

/// Ticker firing every `period`, first at `last + period`.
fn heartbeat(last: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(last + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::sync::Arc;

    fn coordinator(max_interval: Duration) -> Coordinator {
        let backend = Arc::new(MemoryBackend::new());
        let client = LeaseClient::new(backend, "locks".into(), "owner-a".into());
        let (faults, _) = broadcast::channel(8);
        Coordinator::new(client, max_interval, true, faults)
    }

    #[test]
    fn test_retune_shrinks_for_short_leases() {
        let mut coord = coordinator(Duration::from_secs(60));

        coord.held.insert("long".into(), Duration::from_secs(600));
        assert!(!coord.retune());
        assert_eq!(coord.interval, Duration::from_secs(60));

        coord.held.insert("short".into(), Duration::from_secs(10));
        assert!(coord.retune());
        assert_eq!(coord.interval, Duration::from_secs(5));

        coord.held.insert("shorter".into(), Duration::from_secs(4));
        assert!(coord.retune());
        assert_eq!(coord.interval, Duration::from_secs(2));
    }

    #[test]
    fn test_retune_relaxes_after_short_lease_leaves() {
        let mut coord = coordinator(Duration::from_secs(60));
        coord.held.insert("long".into(), Duration::from_secs(90));
        coord.held.insert("short".into(), Duration::from_secs(10));
        coord.retune();
        assert_eq!(coord.interval, Duration::from_secs(5));

        coord.held.remove("short");
        assert!(!coord.retune());
        assert_eq!(coord.interval, Duration::from_secs(60));
    }

    #[test]
    fn test_lease_equal_to_interval_keeps_interval() {
        let mut coord = coordinator(Duration::from_secs(60));
        coord.held.insert("even".into(), Duration::from_secs(60));
        assert!(!coord.retune());
        assert_eq!(coord.interval, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_relaxed_ticker_keeps_phase_of_last_renewal() {
        let mut coord = coordinator(Duration::from_secs(10));
        coord.held.insert("long".into(), Duration::from_secs(10));
        coord.held.insert("short".into(), Duration::from_secs(6));
        coord.retune();
        coord.renew_all().await;
        let renewed = coord.last_renewal;
        tokio::time::advance(Duration::from_millis(2500)).await;

        coord.held.remove("short");
        coord.retune();
        assert_eq!(coord.interval, Duration::from_secs(10));

        let mut ticker = heartbeat(coord.last_renewal, coord.interval);
        assert_eq!(ticker.tick().await, renewed + Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_renew_all_drops_stolen_lock() {
        let backend = Arc::new(MemoryBackend::new());
        let client = LeaseClient::new(backend.clone(), "locks".into(), "owner-a".into());
        let thief = LeaseClient::new(backend.clone(), "locks".into(), "owner-b".into());
        let (faults, mut rx) = broadcast::channel(8);
        let mut coord = Coordinator::new(client.clone(), Duration::from_secs(60), true, faults);

        assert!(client.acquire("kept", Duration::from_secs(30)).await.unwrap());
        assert!(client.acquire("stolen", Duration::from_secs(30)).await.unwrap());
        coord.held.insert("kept".into(), Duration::from_secs(30));
        coord.held.insert("stolen".into(), Duration::from_secs(30));

        backend.remove("locks/stolen").unwrap();
        assert!(thief.acquire("stolen", Duration::from_secs(30)).await.unwrap());

        coord.renew_all().await;

        assert_eq!(
            coord.held.keys().cloned().collect::<Vec<_>>(),
            vec!["kept".to_string()]
        );
        let fault = rx.try_recv().unwrap();
        assert_eq!(fault.lock, "stolen");
        assert_eq!(fault.kind, FaultKind::LeaseLost);
        assert!(rx.try_recv().is_err());
    }
}
