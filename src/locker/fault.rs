//! Faults raised by the coordinator
//!
//! Renewal and release run inside the coordinator task, where no caller is
//! waiting for a result. When one of them fails the locker's belief that it
//! owns the lock is false, so the entry is dropped and a `LockFault` is
//! broadcast to every subscriber.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// Heartbeat found the record owned by someone else, or gone.
    LeaseLost,
    /// Heartbeat renewal hit a backend error.
    RenewalFailed(String),
    /// Release found the record owned by someone else, or gone.
    ReleaseRejected,
    /// Release hit a backend error.
    ReleaseFailed(String),
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::LeaseLost => write!(f, "lease lost"),
            FaultKind::RenewalFailed(e) => write!(f, "renewal failed: {}", e),
            FaultKind::ReleaseRejected => write!(f, "release rejected"),
            FaultKind::ReleaseFailed(e) => write!(f, "release failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockFault {
    /// Owner id of the locker that raised the fault
    pub locker: String,
    /// Lock name (unqualified)
    pub lock: String,
    pub kind: FaultKind,
}

impl LockFault {
    /// Another owner holds (or removed) the record we thought was ours.
    pub fn is_ownership_lost(&self) -> bool {
        matches!(self.kind, FaultKind::LeaseLost | FaultKind::ReleaseRejected)
    }
}

impl fmt::Display for LockFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock {} held by {}: {}", self.lock, self.locker, self.kind)
    }
}
