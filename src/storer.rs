//! Reference [`LogStorer`] that persists raw logs.
//!
//! Real deployments plug in storers that decode events into domain tables;
//! this one keeps the whole log as a JSON payload keyed for idempotency,
//! which is enough to exercise the full dispatch pipeline.

use alloy::rpc::types::Log;
use async_trait::async_trait;
use tracing::debug;

use crate::contracts::LogStorer;
use crate::db::repository::Repository;
use crate::error::StorageError;

/// Stores every log verbatim in the `event_logs` table.
pub struct EventLogStorer {
    repository: Repository,
}

impl EventLogStorer {
    /// Create a storer over the given repository.
    #[must_use]
    pub const fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl LogStorer for EventLogStorer {
    async fn store_log(&self, log: &Log) -> Result<(), StorageError> {
        // A log without block placement or an event signature cannot be
        // keyed; retrying would yield the same malformed log.
        let block_number = log.block_number.ok_or_else(|| {
            StorageError::non_recoverable("log is missing its block number", None)
        })?;
        let block_hash = log
            .block_hash
            .ok_or_else(|| StorageError::non_recoverable("log is missing its block hash", None))?;
        let log_index = log
            .log_index
            .ok_or_else(|| StorageError::non_recoverable("log is missing its log index", None))?;
        let event_signature = log.topics().first().copied().ok_or_else(|| {
            StorageError::non_recoverable("log has no topic0 event signature", None)
        })?;

        let payload = serde_json::to_vec(log).map_err(|e| {
            StorageError::non_recoverable("failed to serialize log payload", Some(Box::new(e)))
        })?;

        let inserted = self
            .repository
            .insert_event_log(
                log.address(),
                event_signature,
                &payload,
                block_number,
                block_hash,
                log.transaction_hash.unwrap_or_default(),
                log_index,
            )
            .await
            .map_err(|e| {
                StorageError::recoverable("failed to insert event log", Some(Box::new(e)))
            })?;

        if !inserted {
            debug!(
                address = ?log.address(),
                block_number,
                log_index,
                "duplicate log ignored"
            );
        }

        Ok(())
    }
}
