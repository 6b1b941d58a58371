//! Row types for the indexer's tables.
//!
//! All rows derive `Serialize` so operational tooling can dump them as JSON.

use serde::Serialize;
use sqlx::FromRow;

/// Persisted cursor for one contract: the highest fully-processed block.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CursorRecord {
    /// Contract address, formatted as a lowercase 0x string
    pub contract_address: String,
    /// Highest fully-processed block number
    pub block_number: i64,
    /// Hash of that block (32 bytes)
    pub block_hash: Vec<u8>,
    /// Unix timestamp of the last update
    pub updated_at: i64,
}

/// A block in the verification window used for reorg detection.
///
/// `block_hash` is nullable: a NULL hash marks a placeholder row (the genesis
/// edge case), which the reorg handler treats as trivially canonical.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredBlockRecord {
    /// Block number
    pub block_number: i64,
    /// Block hash, or NULL for a placeholder row
    pub block_hash: Option<Vec<u8>>,
    /// Whether this block is still on the canonical chain
    pub is_canonical: bool,
}

/// An indexed event log, stored raw.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventLogRecord {
    /// Auto-incrementing row id
    pub id: i64,
    /// Emitting contract address
    pub contract_address: String,
    /// topic0 of the event (32 bytes)
    pub event_signature: Vec<u8>,
    /// ABI-encoded event data plus indexed topics, serialized
    pub payload: Vec<u8>,
    /// Block the event was emitted in
    pub block_number: i64,
    /// Hash of that block
    pub block_hash: Vec<u8>,
    /// Transaction that emitted the event
    pub transaction_hash: Vec<u8>,
    /// Position of the log within the block
    pub log_index: i64,
}
