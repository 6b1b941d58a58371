//! Integration tests for the windowed last-common-ancestor search.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use std::sync::Arc;

use common::{hash_for, test_repository, MockChainClient};
use evm_log_indexer::error::IndexerError;
use evm_log_indexer::reorg::ReorgHandler;

const OLD_FORK: u8 = 1;
const NEW_FORK: u8 = 2;

/// Stored chain: blocks `[from, to]` on `OLD_FORK`.
async fn store_blocks(repository: &evm_log_indexer::db::repository::Repository, from: u64, to: u64) {
    for number in from..=to {
        repository
            .upsert_stored_block(number, hash_for(number, OLD_FORK))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_finds_exact_divergence_point() {
    let (repository, _dir) = test_repository().await;
    store_blocks(&repository, 1, 100).await;

    // The chain agrees up to block 37 and forked after it.
    let client = MockChainClient::new(100);
    client.set_blocks(1, 37, OLD_FORK);
    client.set_blocks(38, 100, NEW_FORK);

    let handler = ReorgHandler::new(Arc::new(client), repository.clone());
    let (number, hash) = handler.find_reorg_point(100).await.unwrap();

    assert_eq!(number, 37);
    assert_eq!(hash, hash_for(37, OLD_FORK));

    // Everything past the ancestor was marked non-canonical.
    let remaining = repository.get_blocks_in_range(1, 100).await.unwrap();
    assert_eq!(remaining.len(), 37);
    assert_eq!(remaining.last().unwrap().block_number, 37);
}

#[tokio::test]
async fn test_divergence_at_window_edge() {
    let (repository, _dir) = test_repository().await;
    store_blocks(&repository, 1, 50).await;

    // Only the newest stored block was replaced.
    let client = MockChainClient::new(50);
    client.set_blocks(1, 49, OLD_FORK);
    client.set_blocks(50, 50, NEW_FORK);

    let handler = ReorgHandler::new(Arc::new(client), repository);
    let (number, _) = handler.find_reorg_point(50).await.unwrap();
    assert_eq!(number, 49);
}

#[tokio::test]
async fn test_all_canonical_window_returns_newest_block() {
    let (repository, _dir) = test_repository().await;
    store_blocks(&repository, 1, 80).await;

    // Chain still agrees everywhere; a spurious detection resolves to the
    // newest stored block and invalidates nothing.
    let client = MockChainClient::new(80);
    client.set_blocks(1, 80, OLD_FORK);

    let handler = ReorgHandler::new(Arc::new(client), repository.clone());
    let (number, hash) = handler.find_reorg_point(80).await.unwrap();

    assert_eq!(number, 80);
    assert_eq!(hash, hash_for(80, OLD_FORK));
    assert_eq!(repository.get_blocks_in_range(1, 80).await.unwrap().len(), 80);
}

#[tokio::test]
async fn test_window_slides_back_to_sparse_history() {
    let (repository, _dir) = test_repository().await;
    // Stored history exists only far below the detection point.
    store_blocks(&repository, 100, 110).await;

    let client = MockChainClient::new(10_000);
    client.set_blocks(100, 110, OLD_FORK);

    let handler = ReorgHandler::new(Arc::new(client), repository);
    let (number, hash) = handler.find_reorg_point(10_000).await.unwrap();

    assert_eq!(number, 110);
    assert_eq!(hash, hash_for(110, OLD_FORK));
}

#[tokio::test]
async fn test_empty_history_reports_no_blocks_found() {
    let (repository, _dir) = test_repository().await;
    let client = MockChainClient::new(5000);

    let handler = ReorgHandler::new(Arc::new(client), repository);
    let result = handler.find_reorg_point(5000).await;
    assert!(matches!(result, Err(IndexerError::NoBlocksFound)));
}

#[tokio::test]
async fn test_genesis_placeholder_row_is_trivially_canonical() {
    let (repository, _dir) = test_repository().await;

    // A placeholder row with no hash was never verified and cannot diverge.
    sqlx::query(
        "INSERT INTO stored_blocks (block_number, block_hash, is_canonical, created_at)
         VALUES (0, NULL, 1, unixepoch())",
    )
    .execute(repository.pool())
    .await
    .unwrap();
    repository
        .upsert_stored_block(1, hash_for(1, OLD_FORK))
        .await
        .unwrap();

    // The chain replaced block 1; only the placeholder survives, and its
    // canonical hash comes from the chain.
    let client = MockChainClient::new(1);
    client.set_block(0, NEW_FORK);
    client.set_block(1, NEW_FORK);

    let handler = ReorgHandler::new(Arc::new(client), repository);
    let (number, hash) = handler.find_reorg_point(1).await.unwrap();

    assert_eq!(number, 0);
    assert_eq!(hash, hash_for(0, NEW_FORK));
}
