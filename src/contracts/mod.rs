//! Contract composition: what to watch, how to store, how to recover.
//!
//! A contract handed to the indexer bundles its identity (address, topic
//! filter, deployment block) with the collaborators the dispatch loop needs:
//! a cursor tracker, a reorg handler, and a pluggable [`LogStorer`] for the
//! domain-specific persistence of each log.

use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use async_trait::async_trait;
use std::sync::Arc;

use crate::db::repository::Repository;
use crate::error::StorageError;
use crate::reorg::ReorgHandler;
use crate::rpc::ChainClient;
use crate::tracker::BlockTracker;

/// Domain-specific persistence of a single log.
///
/// Implementations decide what a log means and how it is stored, and
/// classify failures: [`StorageError::Recoverable`] asks the dispatch loop
/// to retry, [`StorageError::NonRecoverable`] makes it drop the log.
/// Implementations must be idempotent, since a log can be re-delivered
/// after a retry or a restart.
#[async_trait]
pub trait LogStorer: Send + Sync {
    /// Store one log.
    ///
    /// # Errors
    ///
    /// Returns a classified [`StorageError`] on failure.
    async fn store_log(&self, log: &Log) -> Result<(), StorageError>;
}

/// Everything the dispatch loop needs to index one contract.
#[async_trait]
pub trait Contract: Send + Sync {
    /// Address of the watched contract.
    fn address(&self) -> Address;

    /// topic0 filters; empty means every event.
    fn topics(&self) -> &[B256];

    /// Block the contract was deployed at.
    fn start_block(&self) -> u64;

    /// Cursor tracker for this contract.
    fn tracker(&self) -> &BlockTracker;

    /// Reorg handler for this contract.
    fn reorg_handler(&self) -> &ReorgHandler;

    /// Store one log and record its block in the verification window.
    ///
    /// # Errors
    ///
    /// Returns a classified [`StorageError`] on failure.
    async fn store_log(&self, log: &Log) -> Result<(), StorageError>;
}

/// Standard composition of the indexing collaborators for one contract.
pub struct IndexedContract {
    address: Address,
    topics: Vec<B256>,
    start_block: u64,
    tracker: BlockTracker,
    reorg_handler: ReorgHandler,
    storer: Box<dyn LogStorer>,
    repository: Repository,
}

impl IndexedContract {
    /// Assemble the collaborators for one contract, loading or seeding its
    /// cursor from the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be loaded or seeded.
    pub async fn new(
        address: Address,
        topics: Vec<B256>,
        start_block: u64,
        client: Arc<dyn ChainClient>,
        repository: Repository,
        storer: Box<dyn LogStorer>,
    ) -> crate::error::IndexerResult<Self> {
        let tracker =
            BlockTracker::new(address, repository.clone(), client.as_ref(), start_block).await?;
        let reorg_handler = ReorgHandler::new(client, repository.clone());

        Ok(Self {
            address,
            topics,
            start_block,
            tracker,
            reorg_handler,
            storer,
            repository,
        })
    }
}

#[async_trait]
impl Contract for IndexedContract {
    fn address(&self) -> Address {
        self.address
    }

    fn topics(&self) -> &[B256] {
        &self.topics
    }

    fn start_block(&self) -> u64 {
        self.start_block
    }

    fn tracker(&self) -> &BlockTracker {
        &self.tracker
    }

    fn reorg_handler(&self) -> &ReorgHandler {
        &self.reorg_handler
    }

    async fn store_log(&self, log: &Log) -> Result<(), StorageError> {
        self.storer.store_log(log).await?;

        // Only a durably stored log earns its block a place in the
        // verification window.
        if let (Some(number), Some(hash)) = (log.block_number, log.block_hash) {
            self.repository
                .upsert_stored_block(number, hash)
                .await
                .map_err(|e| {
                    StorageError::recoverable(
                        "failed to record block in verification window",
                        Some(Box::new(e)),
                    )
                })?;
        }

        Ok(())
    }
}
