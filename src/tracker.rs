//! Per-contract cursor tracking.
//!
//! A [`BlockTracker`] records the highest block that has been fully processed
//! for one contract, persisting every advance before publishing it to
//! readers. Stale updates (a block at or below the current cursor) are
//! rejected cheaply without touching the database, which keeps concurrent
//! writers from ping-ponging the cursor backwards.

use alloy::primitives::{Address, B256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::db::repository::Repository;
use crate::error::{IndexerError, IndexerResult};
use crate::rpc::ChainClient;

/// Tracks the highest fully-processed block for a single contract.
///
/// The cursor is held in memory for cheap reads and persisted on every
/// accepted advance. Reads never block on writes in progress: a new value
/// only becomes visible after its database write has succeeded.
pub struct BlockTracker {
    address: Address,
    /// Fast-path copy of the cursor number for stale-update rejection.
    block_number: AtomicU64,
    /// Consistent (number, hash) pair for readers.
    latest: Mutex<(u64, B256)>,
    /// Serializes the persist-then-publish section across async writers.
    write_lock: tokio::sync::Mutex<()>,
    repository: Repository,
}

impl BlockTracker {
    /// Load or seed the tracker for a contract.
    ///
    /// If a cursor row exists in the database it wins. Otherwise the tracker
    /// seeds from `start_block` (the contract's deployment block), fetching
    /// its hash from the chain; the seed is not persisted until the first
    /// accepted update.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be read or the seed block
    /// cannot be fetched.
    pub async fn new(
        address: Address,
        repository: Repository,
        client: &dyn ChainClient,
        start_block: u64,
    ) -> IndexerResult<Self> {
        let (number, hash) = match repository.get_latest_block(address).await? {
            Some((number, hash)) => {
                info!(?address, block_number = number, "resuming from persisted cursor");
                (number, hash)
            }
            None => {
                let block = client.block_by_number(start_block).await?;
                info!(
                    ?address,
                    block_number = start_block,
                    "no persisted cursor, seeding from deployment block"
                );
                (block.number, block.hash)
            }
        };

        Ok(Self {
            address,
            block_number: AtomicU64::new(number),
            latest: Mutex::new((number, hash)),
            write_lock: tokio::sync::Mutex::new(()),
            repository,
        })
    }

    /// The contract this tracker belongs to.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Current cursor as a consistent (number, hash) pair.
    pub fn get_latest_block(&self) -> (u64, B256) {
        self.latest
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .to_owned()
    }

    /// Advance the cursor to `block_number` with `block_hash`.
    ///
    /// A zero hash is rejected outright. An update at or below the current
    /// cursor is silently ignored; double-checked locking means the common
    /// stale case costs a single atomic load. An accepted update is
    /// persisted first and only then made visible to readers.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::EmptyBlockHash`] for a zero hash, or a
    /// database error if persistence fails (the in-memory cursor is left
    /// untouched in that case).
    pub async fn update_latest_block(
        &self,
        block_number: u64,
        block_hash: B256,
    ) -> IndexerResult<()> {
        if block_hash.is_zero() {
            return Err(IndexerError::EmptyBlockHash);
        }

        // Fast path: no lock needed to reject a stale update.
        if block_number <= self.block_number.load(Ordering::Acquire) {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;

        // Re-check under the lock; another writer may have advanced past us
        // while we waited.
        if block_number <= self.block_number.load(Ordering::Acquire) {
            return Ok(());
        }

        self.repository
            .set_latest_block(self.address, block_number, block_hash)
            .await?;

        {
            let mut latest = self
                .latest
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *latest = (block_number, block_hash);
        }
        self.block_number.store(block_number, Ordering::Release);

        debug!(address = ?self.address, block_number, "cursor advanced");

        Ok(())
    }
}
