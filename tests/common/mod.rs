//! Shared fixtures for the integration tests: a scripted chain client,
//! tempfile-backed databases, and log constructors.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use alloy::primitives::{Address, Bytes, LogData, B256};
use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use evm_log_indexer::db::create_pool;
use evm_log_indexer::db::repository::Repository;
use evm_log_indexer::error::{IndexerError, IndexerResult};
use evm_log_indexer::rpc::{BlockRecord, ChainClient};

/// Deterministic hash for a block number under a given fork salt.
pub fn hash_for(number: u64, salt: u8) -> B256 {
    let mut bytes = [salt; 32];
    bytes[..8].copy_from_slice(&number.to_be_bytes());
    B256::from(bytes)
}

/// Build an rpc log placed at (block, index) with a deterministic payload.
pub fn make_log(address: Address, block_number: u64, log_index: u64, salt: u8) -> Log {
    let topic0 = hash_for(log_index, salt.wrapping_add(1));
    Log {
        inner: alloy::primitives::Log {
            address,
            data: LogData::new_unchecked(vec![topic0], Bytes::from(vec![salt])),
        },
        block_hash: Some(hash_for(block_number, salt)),
        block_number: Some(block_number),
        block_timestamp: None,
        transaction_hash: Some(hash_for(block_number.wrapping_mul(31) + log_index, salt)),
        transaction_index: Some(0),
        log_index: Some(log_index),
        removed: false,
    }
}

/// Fresh migrated database in a temp directory. Keep the [`TempDir`] alive
/// for the duration of the test.
pub async fn test_repository() -> (Repository, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}/test.db", dir.path().display());
    let pool = create_pool(&url).await.unwrap();
    (Repository::new(pool), dir)
}

/// Scripted chain client.
///
/// Blocks come from an explicit map so a test can describe both the
/// pre-reorg and post-reorg chain. `eth_getLogs` responses are consumed from
/// a script queue; an exhausted queue returns an empty page. Every method
/// counts its calls.
pub struct MockChainClient {
    head: AtomicU64,
    blocks: Mutex<HashMap<u64, BlockRecord>>,
    log_script: Mutex<VecDeque<Result<Vec<Log>, String>>>,
    /// (from, to) of every eth_getLogs filter seen.
    queried_ranges: Mutex<Vec<(u64, u64)>>,
    pub block_number_calls: AtomicU64,
    pub block_by_number_calls: AtomicU64,
    pub get_logs_calls: AtomicU64,
}

impl MockChainClient {
    pub fn new(head: u64) -> Self {
        Self {
            head: AtomicU64::new(head),
            blocks: Mutex::new(HashMap::new()),
            log_script: Mutex::new(VecDeque::new()),
            queried_ranges: Mutex::new(Vec::new()),
            block_number_calls: AtomicU64::new(0),
            block_by_number_calls: AtomicU64::new(0),
            get_logs_calls: AtomicU64::new(0),
        }
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Define the chain block at `number`.
    pub fn set_block(&self, number: u64, salt: u8) {
        let record = BlockRecord {
            number,
            hash: hash_for(number, salt),
            parent_hash: hash_for(number.wrapping_sub(1), salt),
        };
        self.blocks.lock().unwrap().insert(number, record);
    }

    /// Define chain blocks `[from, to]` under one fork salt.
    pub fn set_blocks(&self, from: u64, to: u64, salt: u8) {
        for number in from..=to {
            self.set_block(number, salt);
        }
    }

    pub fn push_logs(&self, logs: Vec<Log>) {
        self.log_script.lock().unwrap().push_back(Ok(logs));
    }

    pub fn push_error(&self, message: &str) {
        self.log_script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn get_logs_call_count(&self) -> u64 {
        self.get_logs_calls.load(Ordering::SeqCst)
    }

    pub fn block_number_call_count(&self) -> u64 {
        self.block_number_calls.load(Ordering::SeqCst)
    }

    pub fn queried_ranges(&self) -> Vec<(u64, u64)> {
        self.queried_ranges.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn block_number(&self) -> IndexerResult<u64> {
        self.block_number_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn block_by_number(&self, number: u64) -> IndexerResult<BlockRecord> {
        self.block_by_number_calls.fetch_add(1, Ordering::SeqCst);
        self.blocks
            .lock()
            .unwrap()
            .get(&number)
            .copied()
            .ok_or(IndexerError::BlockNotFound { number })
    }

    async fn get_logs(&self, filter: &Filter) -> IndexerResult<Vec<Log>> {
        self.get_logs_calls.fetch_add(1, Ordering::SeqCst);
        if let (Some(from), Some(to)) = (filter.get_from_block(), filter.get_to_block()) {
            self.queried_ranges.lock().unwrap().push((from, to));
        }
        match self.log_script.lock().unwrap().pop_front() {
            Some(Ok(logs)) => Ok(logs),
            Some(Err(message)) => Err(IndexerError::rpc(message, None)),
            None => Ok(Vec::new()),
        }
    }
}
