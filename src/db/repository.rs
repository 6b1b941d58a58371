//! Data access layer for cursors, stored blocks, and event logs.

use alloy::primitives::{Address, B256};
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::models::{CursorRecord, EventLogRecord, StoredBlockRecord};
use crate::error::{IndexerError, IndexerResult};

/// Repository wrapping all database access for the indexer.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository backed by the given pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for callers that need raw queries.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Key used for the cursor table: lowercase 0x-prefixed hex.
    fn address_key(address: Address) -> String {
        format!("{address:?}")
    }

    /// Fetch the persisted cursor for a contract, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure or if the stored hash is malformed.
    pub async fn get_latest_block(
        &self,
        address: Address,
    ) -> IndexerResult<Option<(u64, B256)>> {
        let row: Option<CursorRecord> = sqlx::query_as(
            "SELECT contract_address, block_number, block_hash, updated_at
             FROM contract_cursors WHERE contract_address = ?1",
        )
        .bind(Self::address_key(address))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::database("failed to fetch cursor", Some(Box::new(e))))?;

        match row {
            None => Ok(None),
            Some(record) => {
                if record.block_hash.len() != 32 {
                    return Err(IndexerError::database(
                        format!(
                            "stored cursor hash has invalid length {}",
                            record.block_hash.len()
                        ),
                        None,
                    ));
                }
                #[allow(clippy::cast_sign_loss)]
                Ok(Some((
                    record.block_number as u64,
                    B256::from_slice(&record.block_hash),
                )))
            }
        }
    }

    /// Persist the cursor for a contract, inserting or replacing the row.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub async fn set_latest_block(
        &self,
        address: Address,
        block_number: u64,
        block_hash: B256,
    ) -> IndexerResult<()> {
        #[allow(clippy::cast_possible_wrap)]
        sqlx::query(
            "INSERT INTO contract_cursors (contract_address, block_number, block_hash, updated_at)
             VALUES (?1, ?2, ?3, unixepoch())
             ON CONFLICT (contract_address) DO UPDATE SET
                 block_number = excluded.block_number,
                 block_hash = excluded.block_hash,
                 updated_at = excluded.updated_at",
        )
        .bind(Self::address_key(address))
        .bind(block_number as i64)
        .bind(block_hash.as_slice())
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::database("failed to persist cursor", Some(Box::new(e))))?;

        debug!(?address, block_number, "cursor persisted");

        Ok(())
    }

    /// Fetch the canonical stored blocks in `[from, to]`, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub async fn get_blocks_in_range(
        &self,
        from: u64,
        to: u64,
    ) -> IndexerResult<Vec<StoredBlockRecord>> {
        #[allow(clippy::cast_possible_wrap)]
        let rows: Vec<StoredBlockRecord> = sqlx::query_as(
            "SELECT block_number, block_hash, is_canonical FROM stored_blocks
             WHERE block_number >= ?1 AND block_number <= ?2 AND is_canonical = 1
             ORDER BY block_number ASC",
        )
        .bind(from as i64)
        .bind(to as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::database("failed to fetch stored blocks", Some(Box::new(e))))?;

        Ok(rows)
    }

    /// Record a block's hash in the verification window.
    ///
    /// Replaces any existing row for the same number, which is how a
    /// re-indexed block after a reorg gets its new hash.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub async fn upsert_stored_block(
        &self,
        block_number: u64,
        block_hash: B256,
    ) -> IndexerResult<()> {
        #[allow(clippy::cast_possible_wrap)]
        sqlx::query(
            "INSERT INTO stored_blocks (block_number, block_hash, is_canonical, created_at)
             VALUES (?1, ?2, 1, unixepoch())
             ON CONFLICT (block_number) DO UPDATE SET
                 block_hash = excluded.block_hash,
                 is_canonical = 1",
        )
        .bind(block_number as i64)
        .bind(block_hash.as_slice())
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::database("failed to upsert stored block", Some(Box::new(e))))?;

        Ok(())
    }

    /// Mark stored blocks after `reorg_point` up to and including `to` as
    /// no longer canonical.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub async fn update_blocks_canonicality_in_range(
        &self,
        reorg_point: u64,
        to: u64,
    ) -> IndexerResult<u64> {
        #[allow(clippy::cast_possible_wrap)]
        let result = sqlx::query(
            "UPDATE stored_blocks SET is_canonical = 0
             WHERE block_number > ?1 AND block_number <= ?2",
        )
        .bind(reorg_point as i64)
        .bind(to as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            IndexerError::database("failed to update block canonicality", Some(Box::new(e)))
        })?;

        Ok(result.rows_affected())
    }

    /// Insert a raw event log, ignoring duplicates.
    ///
    /// The unique key `(contract_address, block_number, log_index)` makes
    /// retried and re-delivered logs idempotent. Returns `true` if a row was
    /// actually written.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_event_log(
        &self,
        address: Address,
        event_signature: B256,
        payload: &[u8],
        block_number: u64,
        block_hash: B256,
        transaction_hash: B256,
        log_index: u64,
    ) -> IndexerResult<bool> {
        #[allow(clippy::cast_possible_wrap)]
        let result = sqlx::query(
            "INSERT INTO event_logs
                 (contract_address, event_signature, payload, block_number,
                  block_hash, transaction_hash, log_index, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, unixepoch())
             ON CONFLICT (contract_address, block_number, log_index) DO NOTHING",
        )
        .bind(Self::address_key(address))
        .bind(event_signature.as_slice())
        .bind(payload)
        .bind(block_number as i64)
        .bind(block_hash.as_slice())
        .bind(transaction_hash.as_slice())
        .bind(log_index as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::database("failed to insert event log", Some(Box::new(e))))?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch a contract's stored logs in `[from, to]`, ordered by block and
    /// log index.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub async fn get_event_logs_in_range(
        &self,
        address: Address,
        from: u64,
        to: u64,
    ) -> IndexerResult<Vec<EventLogRecord>> {
        #[allow(clippy::cast_possible_wrap)]
        let rows: Vec<EventLogRecord> = sqlx::query_as(
            "SELECT id, contract_address, event_signature, payload, block_number,
                    block_hash, transaction_hash, log_index
             FROM event_logs
             WHERE contract_address = ?1 AND block_number >= ?2 AND block_number <= ?3
             ORDER BY block_number ASC, log_index ASC",
        )
        .bind(Self::address_key(address))
        .bind(from as i64)
        .bind(to as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::database("failed to fetch event logs", Some(Box::new(e))))?;

        Ok(rows)
    }

    /// Count the event logs stored for a contract.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub async fn count_event_logs(&self, address: Address) -> IndexerResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM event_logs WHERE contract_address = ?1")
                .bind(Self::address_key(address))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    IndexerError::database("failed to count event logs", Some(Box::new(e)))
                })?;

        #[allow(clippy::cast_sign_loss)]
        Ok(count as u64)
    }
}
