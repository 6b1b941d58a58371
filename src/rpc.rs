//! Chain-RPC access for the indexing engine.
//!
//! The engine talks to the chain exclusively through the [`ChainClient`]
//! trait: head queries, block-by-number queries, and filtered log fetches.
//! Production code uses [`HttpChainClient`], a thin wrapper over an Alloy
//! HTTP provider; tests substitute a scripted implementation.
//!
//! # Example
//!
//! ```no_run
//! use evm_log_indexer::rpc::{create_provider, ChainClient, HttpChainClient};
//! use evm_log_indexer::error::IndexerResult;
//!
//! # async fn example() -> IndexerResult<()> {
//! let provider = create_provider("https://my-l2.example.com/rpc")?;
//! let client = HttpChainClient::new(provider);
//! let head = client.block_number().await?;
//! println!("chain head: {head}");
//! # Ok(())
//! # }
//! ```

use alloy::primitives::B256;
use alloy::providers::{Provider as AlloyProvider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Filter, Log};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{IndexerError, IndexerResult};

/// Type alias for the HTTP provider used in production.
pub type Provider = RootProvider<Http<Client>>;

/// Minimal record of a chain block: everything reorg detection needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    /// Block number
    pub number: u64,

    /// Block hash
    pub hash: B256,

    /// Parent block hash
    pub parent_hash: B256,
}

/// Boundary contract over the chain's RPC protocol.
///
/// Callers are expected to enforce their own RPC timeouts; the engine layers
/// no per-call timeout of its own, only sleep-based backoff between attempts.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Returns the current chain head number.
    async fn block_number(&self) -> IndexerResult<u64>;

    /// Returns the block currently at `number` on the canonical chain.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::BlockNotFound`] if the chain has no block at
    /// that number.
    async fn block_by_number(&self, number: u64) -> IndexerResult<BlockRecord>;

    /// Returns all logs matching the filter, in ascending
    /// `(block_number, log_index)` order as the node reports them.
    async fn get_logs(&self, filter: &Filter) -> IndexerResult<Vec<Log>>;
}

/// Create a new Ethereum RPC provider connected via HTTP.
///
/// # Errors
///
/// Returns an error if the RPC URL cannot be parsed.
pub fn create_provider(rpc_url: &str) -> IndexerResult<Provider> {
    let url = rpc_url.parse().map_err(|e| {
        IndexerError::rpc(
            format!("Failed to parse RPC URL: '{rpc_url}'"),
            Some(Box::new(e)),
        )
    })?;

    let provider = ProviderBuilder::new().on_http(url);
    info!("RPC provider initialized");

    Ok(provider)
}

/// [`ChainClient`] backed by an Alloy HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpChainClient {
    provider: Provider,
}

impl HttpChainClient {
    /// Wrap an existing provider.
    #[must_use]
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn block_number(&self) -> IndexerResult<u64> {
        self.provider.get_block_number().await.map_err(|e| {
            IndexerError::rpc("Failed to fetch latest block number", Some(Box::new(e)))
        })
    }

    async fn block_by_number(&self, number: u64) -> IndexerResult<BlockRecord> {
        let block = self
            .provider
            .get_block_by_number(number.into(), BlockTransactionsKind::Hashes)
            .await
            .map_err(|e| {
                IndexerError::rpc(format!("Failed to fetch block {number}"), Some(Box::new(e)))
            })?
            .ok_or(IndexerError::BlockNotFound { number })?;

        debug!(
            block_number = block.header.number,
            block_hash = %block.header.hash,
            "fetched block"
        );

        Ok(BlockRecord {
            number: block.header.number,
            hash: block.header.hash,
            parent_hash: block.header.parent_hash,
        })
    }

    async fn get_logs(&self, filter: &Filter) -> IndexerResult<Vec<Log>> {
        self.provider
            .get_logs(filter)
            .await
            .map_err(|e| IndexerError::rpc("Failed to fetch logs", Some(Box::new(e))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_invalid_url() {
        let result = create_provider("not-a-valid-url");
        assert!(result.is_err());
    }

    #[test]
    fn test_create_provider_valid_url() {
        let result = create_provider("http://localhost:8545");
        assert!(result.is_ok());
    }

    #[test]
    fn test_block_record_equality() {
        let a = BlockRecord {
            number: 1,
            hash: B256::repeat_byte(0x11),
            parent_hash: B256::repeat_byte(0x10),
        };
        let b = a;
        assert_eq!(a, b);
    }
}
