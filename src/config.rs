//! Configuration management for the indexing engine.
//!
//! Configuration is loaded from environment variables using the `dotenvy`
//! crate. All operations return [`IndexerResult`] for comprehensive error
//! handling.
//!
//! ## Environment Variables
//!
//! Required:
//! - `RPC_URL`: HTTP endpoint of the chain's RPC node
//! - `CONTRACT_ADDRESS`: contract whose event logs are indexed
//!
//! Optional (with defaults):
//! - `DATABASE_URL`: sqlx connection string (default: "sqlite:./indexer.db")
//! - `EVENT_TOPICS`: comma-separated topic0 hashes to filter on (default: all events)
//! - `START_BLOCK`: deployment block to seed the cursor from (default: 0)
//! - `BACKFILL_BLOCKS`: maximum blocks per log query (default: 1000)
//! - `LAG_FROM_HEAD`: safety margin of blocks left unprocessed near the head
//!   (default: 0, appropriate for low-reorg-risk L2s)
//! - `CHAIN_ID`: chain identifier, used for logging only (default: 1)

use alloy::primitives::{Address, B256};
use std::env;

use crate::error::{IndexerError, IndexerResult};

/// Main configuration struct for the indexer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chain RPC URL
    rpc_url: String,

    /// sqlx database URL
    database_url: String,

    /// Contract to index
    contract_address: Address,

    /// topic0 filters; empty means all events from the contract
    topics: Vec<B256>,

    /// Block the contract was deployed at; seeds the cursor on first run
    start_block: u64,

    /// Maximum blocks per log query
    backfill_blocks: u64,

    /// Blocks intentionally left unprocessed near the chain head
    lag_from_head: u64,

    /// Chain identifier (logging only)
    chain_id: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Loads a `.env` file first if one is present, then reads and validates
    /// each variable, applying defaults for the optional ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or any value fails
    /// to parse (invalid address, invalid topic hash, non-numeric number).
    pub fn from_env() -> IndexerResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        let rpc_url = env::var("RPC_URL").map_err(|e| {
            IndexerError::config("RPC_URL environment variable is required", Some(Box::new(e)))
        })?;

        if !rpc_url.starts_with("http") {
            return Err(IndexerError::config(
                format!("RPC_URL must be an http(s) endpoint, got: {rpc_url}"),
                None,
            ));
        }

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./indexer.db".to_string());

        let contract_address = env::var("CONTRACT_ADDRESS")
            .map_err(|e| {
                IndexerError::config(
                    "CONTRACT_ADDRESS environment variable is required",
                    Some(Box::new(e)),
                )
            })?
            .parse::<Address>()
            .map_err(|e| {
                IndexerError::config(
                    "CONTRACT_ADDRESS must be a valid Ethereum address",
                    Some(Box::new(e)),
                )
            })?;

        let topics = match env::var("EVENT_TOPICS") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|t| {
                    t.trim().parse::<B256>().map_err(|e| {
                        IndexerError::config(
                            format!("EVENT_TOPICS entry is not a valid 32-byte hash: {t}"),
                            Some(Box::new(e)),
                        )
                    })
                })
                .collect::<IndexerResult<Vec<B256>>>()?,
            _ => Vec::new(),
        };

        let start_block = parse_u64_var("START_BLOCK", 0)?;
        let backfill_blocks = parse_u64_var("BACKFILL_BLOCKS", 1000)?;
        let lag_from_head = parse_u64_var("LAG_FROM_HEAD", 0)?;
        let chain_id = parse_u64_var("CHAIN_ID", 1)?;

        if backfill_blocks == 0 {
            return Err(IndexerError::config("BACKFILL_BLOCKS must be at least 1", None));
        }

        Ok(Self {
            rpc_url,
            database_url,
            contract_address,
            topics,
            start_block,
            backfill_blocks,
            lag_from_head,
            chain_id,
        })
    }

    /// Get the chain RPC URL.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Get the indexed contract address.
    #[must_use]
    pub const fn contract_address(&self) -> Address {
        self.contract_address
    }

    /// Get the topic0 filters (empty means all events).
    #[must_use]
    pub fn topics(&self) -> &[B256] {
        &self.topics
    }

    /// Get the cursor seed block.
    #[must_use]
    pub const fn start_block(&self) -> u64 {
        self.start_block
    }

    /// Get the maximum blocks per log query.
    #[must_use]
    pub const fn backfill_blocks(&self) -> u64 {
        self.backfill_blocks
    }

    /// Get the safety margin from the chain head.
    #[must_use]
    pub const fn lag_from_head(&self) -> u64 {
        self.lag_from_head
    }

    /// Get the chain identifier.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

fn parse_u64_var(name: &str, default: u64) -> IndexerResult<u64> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<u64>()
        .map_err(|e| {
            IndexerError::config(format!("{name} must be a valid number"), Some(Box::new(e)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-wide; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "RPC_URL",
            "DATABASE_URL",
            "CONTRACT_ADDRESS",
            "EVENT_TOPICS",
            "START_BLOCK",
            "BACKFILL_BLOCKS",
            "LAG_FROM_HEAD",
            "CHAIN_ID",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_config_missing_rpc_url() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        let result = Config::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_invalid_contract_address() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var("CONTRACT_ADDRESS", "not_an_address");

        let result = Config::from_env();
        assert!(result.is_err());

        clear_env();
    }

    #[test]
    fn test_config_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var(
            "CONTRACT_ADDRESS",
            "0x0d4a11d5EEaaC28EC3F61d100daF4d40471f1852",
        );

        let config = Config::from_env();
        assert!(config.is_ok());

        if let Ok(config) = config {
            assert_eq!(config.database_url(), "sqlite:./indexer.db");
            assert_eq!(config.start_block(), 0);
            assert_eq!(config.backfill_blocks(), 1000);
            assert_eq!(config.lag_from_head(), 0);
            assert!(config.topics().is_empty());
        }

        clear_env();
    }

    #[test]
    fn test_config_topic_parsing() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var(
            "CONTRACT_ADDRESS",
            "0x0d4a11d5EEaaC28EC3F61d100daF4d40471f1852",
        );
        env::set_var(
            "EVENT_TOPICS",
            "0x1111111111111111111111111111111111111111111111111111111111111111",
        );

        let config = Config::from_env();
        assert!(config.is_ok());

        if let Ok(config) = config {
            assert_eq!(config.topics().len(), 1);
        }

        clear_env();
    }

    #[test]
    fn test_config_rejects_zero_page_size() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var(
            "CONTRACT_ADDRESS",
            "0x0d4a11d5EEaaC28EC3F61d100daF4d40471f1852",
        );
        env::set_var("BACKFILL_BLOCKS", "0");

        let result = Config::from_env();
        assert!(result.is_err());

        clear_env();
    }
}
