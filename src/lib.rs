//! Chain-log indexing engine for EVM contracts.
//!
//! Watches one or more contracts for event logs, delivering each log to a
//! pluggable storer exactly once per canonical chain state. The engine
//! keeps a persisted per-contract cursor, survives restarts without gaps,
//! and recovers from chain reorganizations by rewinding to the last block
//! the database and the chain still agree on.
//!
//! # Architecture
//!
//! - [`streamer`]: pulls logs from the chain in bounded pages and delivers
//!   them in order over bounded channels
//! - [`dispatch`]: drains each channel into its contract's storer, with
//!   retry classification and reorg detection
//! - [`tracker`]: persisted highest-fully-processed-block cursor
//! - [`reorg`]: windowed search for the last common ancestor after a reorg
//! - [`contracts`]: composition of the above plus a [`contracts::LogStorer`]
//! - [`indexer`]: wires it all together under one shutdown token
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use evm_log_indexer::{config::Config, contracts::IndexedContract, db, indexer::Indexer};
//! use evm_log_indexer::db::repository::Repository;
//! use evm_log_indexer::rpc::{create_provider, HttpChainClient};
//! use evm_log_indexer::storer::EventLogStorer;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let pool = db::create_pool(config.database_url()).await?;
//! let repository = Repository::new(pool);
//! let client = Arc::new(HttpChainClient::new(create_provider(config.rpc_url())?));
//!
//! let contract = IndexedContract::new(
//!     config.contract_address(),
//!     config.topics().to_vec(),
//!     config.start_block(),
//!     client.clone(),
//!     repository.clone(),
//!     Box::new(EventLogStorer::new(repository.clone())),
//! )
//! .await?;
//!
//! let mut indexer = Indexer::new(client);
//! indexer.register_contract(Arc::new(contract));
//! let running = indexer.start();
//! // ... later
//! running.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod contracts;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod indexer;
pub mod metrics;
pub mod observability;
pub mod reorg;
pub mod rpc;
pub mod storer;
pub mod streamer;
pub mod tracker;

pub use error::{IndexerError, IndexerResult, StorageError};
