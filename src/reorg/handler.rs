//! Windowed search for the last common ancestor after a reorg.

use alloy::primitives::B256;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::models::StoredBlockRecord;
use crate::db::repository::Repository;
use crate::error::{IndexerError, IndexerResult};
use crate::reorg::BLOCK_RANGE_SIZE;
use crate::rpc::ChainClient;

/// Finds where the stored chain and the live chain diverge.
pub struct ReorgHandler {
    client: Arc<dyn ChainClient>,
    repository: Repository,
}

impl ReorgHandler {
    /// Create a handler over the given chain client and repository.
    #[must_use]
    pub fn new(client: Arc<dyn ChainClient>, repository: Repository) -> Self {
        Self { client, repository }
    }

    /// Find the last block at or below `detected_at` whose stored hash still
    /// matches the chain, mark everything after it non-canonical, and return
    /// its number and canonical hash.
    ///
    /// The search examines [`BLOCK_RANGE_SIZE`] stored blocks at a time,
    /// sliding the window toward genesis while even the oldest block of the
    /// window disagrees with the chain.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::NoBlocksFound`] if the window slides past
    /// block 0 without finding any stored blocks, or an RPC/database error
    /// from the underlying lookups.
    pub async fn find_reorg_point(&self, detected_at: u64) -> IndexerResult<(u64, B256)> {
        let (mut from, mut to) = block_range(detected_at);

        loop {
            let stored_blocks = self.repository.get_blocks_in_range(from, to).await?;

            if stored_blocks.is_empty() {
                if from == 0 {
                    return Err(IndexerError::NoBlocksFound);
                }
                warn!(from, to, "no stored blocks in window, sliding back");
                (from, to) = block_range(from);
                continue;
            }

            // The oldest block in the window decides whether the divergence
            // is inside this window or further back.
            let oldest = &stored_blocks[0];
            if !self.matches_chain(oldest).await? {
                if from == 0 {
                    // Even block 0 disagrees; everything stored is stale.
                    return Err(IndexerError::NoBlocksFound);
                }
                warn!(
                    block_number = oldest.block_number,
                    "oldest block in window also reorganized, sliding back"
                );
                (from, to) = block_range(from);
                continue;
            }

            let ancestor = self.search_in_range(&stored_blocks).await?;
            let invalidated = self
                .repository
                .update_blocks_canonicality_in_range(ancestor.0, detected_at)
                .await?;

            info!(
                reorg_point = ancestor.0,
                detected_at, invalidated, "found last common ancestor"
            );

            return Ok(ancestor);
        }
    }

    /// True when the stored row's hash matches the chain's hash for that
    /// number. A row with a NULL hash was never verified and counts as a
    /// match.
    async fn matches_chain(&self, stored: &StoredBlockRecord) -> IndexerResult<bool> {
        let Some(stored_hash) = stored.block_hash.as_deref() else {
            return Ok(true);
        };
        #[allow(clippy::cast_sign_loss)]
        let chain_block = self.client.block_by_number(stored.block_number as u64).await?;
        Ok(chain_block.hash.as_slice() == stored_hash)
    }

    /// Binary search for the last matching block in a window whose first
    /// block is known to match: the answer is the matching block immediately
    /// followed by a mismatch, or the newest block if the whole window
    /// matches.
    async fn search_in_range(
        &self,
        blocks: &[StoredBlockRecord],
    ) -> IndexerResult<(u64, B256)> {
        let mut left = 0usize;
        let mut right = blocks.len() - 1;

        while left <= right {
            let mid = left + (right - left) / 2;

            if self.matches_chain(&blocks[mid]).await? {
                if mid == right {
                    return self.canonical_point(&blocks[mid]).await;
                }
                if !self.matches_chain(&blocks[mid + 1]).await? {
                    return self.canonical_point(&blocks[mid]).await;
                }
                left = mid + 1;
            } else {
                if mid == 0 {
                    break;
                }
                right = mid - 1;
            }
        }

        // The caller verified blocks[0] matches, so the search cannot fail.
        Err(IndexerError::state(
            "binary search found no common ancestor in a window whose oldest block matches",
            None,
        ))
    }

    /// Resolve a matching row to (number, canonical hash). Rows with a NULL
    /// hash take their hash from the chain.
    async fn canonical_point(&self, stored: &StoredBlockRecord) -> IndexerResult<(u64, B256)> {
        #[allow(clippy::cast_sign_loss)]
        let number = stored.block_number as u64;
        match stored.block_hash.as_deref() {
            Some(hash) if hash.len() == 32 => Ok((number, B256::from_slice(hash))),
            Some(hash) => Err(IndexerError::database(
                format!("stored block hash has invalid length {}", hash.len()),
                None,
            )),
            None => {
                let chain_block = self.client.block_by_number(number).await?;
                Ok((number, chain_block.hash))
            }
        }
    }
}

/// Window `[from, to]` examined for a search that starts at `to`.
const fn block_range(to: u64) -> (u64, u64) {
    (to.saturating_sub(BLOCK_RANGE_SIZE), to)
}
