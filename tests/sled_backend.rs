//! Lockers sharing one sled-backed lock table

#![cfg(feature = "sled-backend")]

use minilock::backend::{record_key, SledBackend};
use minilock::Locker;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

const LEASE: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_contention_and_release() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(SledBackend::open(dir.path()).unwrap());
    let token = CancellationToken::new();

    let x = Locker::new(backend.clone(), &token, "locks");
    let y = Locker::new(backend.clone(), &token, "locks");

    assert!(assert_ok!(x.acquire("job-17", LEASE).await));
    assert!(!assert_ok!(y.acquire("job-17", LEASE).await));

    let record = backend.get(&record_key("locks", "job-17")).unwrap().unwrap();
    assert_eq!(record.owner_id, x.owner_id());

    x.release("job-17").await;
    assert!(assert_ok!(y.acquire("job-17", LEASE).await));
}

#[tokio::test]
async fn test_close_clears_the_table() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(SledBackend::open(dir.path()).unwrap());
    let token = CancellationToken::new();

    let x = Locker::new(backend.clone(), &token, "locks");
    assert!(assert_ok!(x.acquire("a", LEASE).await));
    assert!(assert_ok!(x.acquire("b", LEASE).await));
    assert_eq!(backend.len(), 2);

    x.close().await;
    assert!(backend.is_empty());
}
