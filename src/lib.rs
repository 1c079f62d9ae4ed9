//! # minilock
//!
//! Distributed mutual-exclusion locks with automatic lease renewal, built on
//! any key-value store that offers atomic conditional writes:
//! - No lock-manager service: the store's conditional put is the only arbiter
//! - Leases expire on their own if the holder disappears
//! - A per-locker heartbeat keeps held leases alive
//! - Renewal and release failures are reported, never fatal
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Locker                      │
//! │  acquire ──conditional put (caller task)──┐  │
//! │     │ record          release             │  │
//! │     ▼                    │                │  │
//! │  ┌─────────────────────────────────────┐  │  │
//! │  │ Coordinator task (owns held set)    │  │  │
//! │  │  - heartbeat ticks → renew all      │──┤  │
//! │  │  - release → conditional delete     │  │  │
//! │  │  - shutdown → drain + release       │  │  │
//! │  └─────────────────────────────────────┘  │  │
//! └───────────────────────────────────────────┼──┘
//!                                             │
//!                            ┌────────────────▼─────────────┐
//!                            │ StoreBackend (shared table)  │
//!                            │  {name, owner_id, expires_at}│
//!                            └──────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use minilock::{backend::MemoryBackend, Locker};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> minilock::Result<()> {
//! let backend = Arc::new(MemoryBackend::new());
//! let shutdown = CancellationToken::new();
//! let locker = Locker::new(backend, &shutdown, "locks");
//!
//! if locker.acquire("job-17", Duration::from_secs(30)).await? {
//!     // ... exclusive work, the heartbeat keeps the lease alive ...
//!     locker.release("job-17").await;
//! }
//! locker.close().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod common;
pub mod locker;

// Re-export commonly used types
pub use backend::{DeleteOutcome, LockRecord, PutOutcome, StoreBackend};
pub use common::{Error, LockerConfig, Result};
pub use locker::{FaultKind, LockFault, Locker};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
