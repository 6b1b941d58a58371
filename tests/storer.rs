//! Integration tests for the reference raw-log storer.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use alloy::primitives::Address;

use common::{hash_for, make_log, test_repository};
use evm_log_indexer::contracts::LogStorer;
use evm_log_indexer::error::StorageError;
use evm_log_indexer::storer::EventLogStorer;

const CONTRACT: Address = Address::repeat_byte(0x42);
const FORK: u8 = 1;

#[tokio::test]
async fn test_stores_log_with_full_placement() {
    let (repository, _dir) = test_repository().await;
    let storer = EventLogStorer::new(repository.clone());

    storer.store_log(&make_log(CONTRACT, 10, 3, FORK)).await.unwrap();

    let records = repository
        .get_event_logs_in_range(CONTRACT, 0, 100)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].block_number, 10);
    assert_eq!(records[0].log_index, 3);
    assert_eq!(records[0].block_hash, hash_for(10, FORK).to_vec());
    assert!(!records[0].payload.is_empty());
}

#[tokio::test]
async fn test_redelivered_log_is_idempotent() {
    let (repository, _dir) = test_repository().await;
    let storer = EventLogStorer::new(repository.clone());

    let log = make_log(CONTRACT, 10, 0, FORK);
    storer.store_log(&log).await.unwrap();
    storer.store_log(&log).await.unwrap();

    assert_eq!(repository.count_event_logs(CONTRACT).await.unwrap(), 1);
}

#[tokio::test]
async fn test_logs_ordered_by_block_and_index() {
    let (repository, _dir) = test_repository().await;
    let storer = EventLogStorer::new(repository.clone());

    storer.store_log(&make_log(CONTRACT, 20, 1, FORK)).await.unwrap();
    storer.store_log(&make_log(CONTRACT, 10, 5, FORK)).await.unwrap();
    storer.store_log(&make_log(CONTRACT, 20, 0, FORK)).await.unwrap();

    let records = repository
        .get_event_logs_in_range(CONTRACT, 0, 100)
        .await
        .unwrap();
    let placement: Vec<(i64, i64)> = records
        .iter()
        .map(|r| (r.block_number, r.log_index))
        .collect();
    assert_eq!(placement, vec![(10, 5), (20, 0), (20, 1)]);
}

#[tokio::test]
async fn test_pending_log_is_non_recoverable() {
    let (repository, _dir) = test_repository().await;
    let storer = EventLogStorer::new(repository.clone());

    // A pending log has no block placement yet; retrying cannot fix it.
    let mut log = make_log(CONTRACT, 10, 0, FORK);
    log.block_number = None;
    log.block_hash = None;

    let result = storer.store_log(&log).await;
    assert!(matches!(result, Err(StorageError::NonRecoverable { .. })));
    assert_eq!(repository.count_event_logs(CONTRACT).await.unwrap(), 0);
}

#[tokio::test]
async fn test_anonymous_log_is_non_recoverable() {
    let (repository, _dir) = test_repository().await;
    let storer = EventLogStorer::new(repository.clone());

    // No topic0 means no event signature to key on.
    let mut log = make_log(CONTRACT, 10, 0, FORK);
    log.inner.data = alloy::primitives::LogData::new_unchecked(
        Vec::new(),
        alloy::primitives::Bytes::new(),
    );

    let result = storer.store_log(&log).await;
    assert!(matches!(result, Err(StorageError::NonRecoverable { .. })));
}
