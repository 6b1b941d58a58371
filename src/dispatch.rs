//! Dispatch loop: drains a contract's log channel into its storer.
//!
//! Runs until the channel closes or shutdown is signalled, storing each log
//! with retry semantics decided by [`StorageError`] classification. The loop
//! also owns reorg detection: periodically, and whenever a provider marks a
//! log as removed, it compares the tracked cursor hash against the chain and
//! rewinds the stream when they disagree.

use alloy::primitives::B256;
use alloy::rpc::types::Log;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::contracts::Contract;
use crate::error::StorageError;
use crate::metrics;
use crate::rpc::ChainClient;

/// How many blocks may pass between periodic reorg checks.
///
/// At one block every 0.25s this is a check every 15 seconds, which bounds
/// how much work a late-detected reorg can invalidate.
pub const REORG_CHECK_INTERVAL: u64 = 60;

/// Sleep between retries of a recoverable storage failure.
const RETRY_SLEEP_TIME: Duration = Duration::from_millis(100);

/// Drain `event_rx` into the contract's storer until the channel closes or
/// the token fires.
///
/// Storage failures classified as recoverable are retried indefinitely with
/// a short sleep; non-recoverable failures drop the log and move on without
/// advancing the cursor. Detected reorgs rewind the cursor to the last
/// common ancestor and push the rewind point into `reorg_tx` for the
/// streamer.
pub async fn index_logs(
    client: Arc<dyn ChainClient>,
    mut event_rx: mpsc::Receiver<Log>,
    reorg_tx: mpsc::Sender<u64>,
    contract: Arc<dyn Contract>,
    token: CancellationToken,
) {
    let address_label = format!("{:?}", contract.address());

    // All sentinels use 0 for "unset"; block 0 never carries indexable work
    // past the genesis edge case.
    let mut stored_block_number: u64 = 0;
    let mut stored_block_hash = B256::ZERO;
    let mut last_block_seen: u64 = 0;
    let mut reorg_check_at: u64 = 0;
    let mut reorg_detected_at: u64 = 0;
    let mut reorg_begins_at: u64 = 0;
    let mut reorg_finishes_at: u64 = 0;
    let mut reorg_in_progress = false;

    loop {
        let log = tokio::select! {
            () = token.cancelled() => break,
            received = event_rx.recv() => match received {
                Some(log) => log,
                None => break,
            },
        };
        let started = Instant::now();

        let Some(event_block) = log.block_number else {
            warn!(address = %address_label, "dropping log without a block number");
            metrics::record_abandoned_log(&address_label);
            continue;
        };

        // 1.1 Active reorg state: discard events past the detection point
        // until the rewound stream comes back around. The rewind lands
        // below the detection point, so an event at or below it can only
        // be the replay.
        if reorg_detected_at > 0 {
            if event_block > reorg_detected_at {
                debug!(
                    address = %address_label,
                    event_block,
                    reorg_begins_at,
                    "discarding future event due to reorg"
                );
                continue;
            }
            info!(
                address = %address_label,
                event_block,
                reorg_begins_at,
                "starting processing reorg"
            );

            (stored_block_number, stored_block_hash) = contract.tracker().get_latest_block();
            last_block_seen = event_block;
            reorg_detected_at = 0;
            reorg_in_progress = true;
        }

        // 1.2 Reorg fully replayed once we move past its far edge.
        if reorg_in_progress && event_block > reorg_finishes_at {
            info!(
                address = %address_label,
                event_block,
                reorg_finishes_at,
                "finished processing reorg"
            );
            reorg_in_progress = false;
        }

        // 2. Refresh the cursor snapshot once per block.
        if last_block_seen > 0 && last_block_seen != event_block {
            (stored_block_number, stored_block_hash) = contract.tracker().get_latest_block();
        }
        last_block_seen = event_block;

        // A provider-flagged removal is a reorg announcement; skip the
        // periodic schedule and verify immediately.
        let removal_flagged = log.removed && !reorg_in_progress && reorg_detected_at == 0;

        // 3. Periodic reorg check: only outside an active reorg, with a real
        // cursor, for events past it, on the check interval.
        if removal_flagged
            || (!reorg_in_progress
                && stored_block_number > 0
                && event_block > stored_block_number
                && event_block >= reorg_check_at + REORG_CHECK_INTERVAL)
        {
            match client.block_by_number(stored_block_number).await {
                Err(error) => {
                    warn!(
                        address = %address_label,
                        block_number = stored_block_number,
                        %error,
                        "error querying block from the chain, proceeding with event processing"
                    );
                }
                Ok(onchain_block) => {
                    reorg_check_at = event_block;
                    debug!(
                        address = %address_label,
                        block_number = reorg_check_at,
                        "periodic reorg check"
                    );

                    let hash_diverged =
                        !stored_block_hash.is_zero() && stored_block_hash != onchain_block.hash;

                    if hash_diverged || removal_flagged {
                        let (reorg_block_number, reorg_block_hash) =
                            match contract.reorg_handler().find_reorg_point(stored_block_number).await {
                                Ok(point) => point,
                                Err(crate::error::IndexerError::NoBlocksFound) => {
                                    // Nothing stored to rewind to; replay
                                    // from the very beginning.
                                    (0, onchain_block.hash)
                                }
                                Err(error) => {
                                    error!(address = %address_label, %error, "reorg point not found");
                                    continue;
                                }
                            };

                        // A rewind point at or above the cursor means every
                        // stored block still matches the chain (a healed
                        // removal, typically). Entering the discard state
                        // would throw away everything the rewound stream
                        // delivers, so treat it as a false alarm.
                        if reorg_block_number >= stored_block_number {
                            info!(
                                address = %address_label,
                                stored_block_number,
                                reorg_block_number,
                                removal_flagged,
                                "stored blocks still canonical, nothing to rewind"
                            );
                        } else {
                            warn!(
                                address = %address_label,
                                stored_block_number,
                                stored_block_hash = %stored_block_hash,
                                onchain_block_hash = %onchain_block.hash,
                                removal_flagged,
                                "chain reorg detected"
                            );
                            metrics::record_reorg_detected(&address_label);

                            reorg_detected_at = stored_block_number;
                            reorg_begins_at = reorg_block_number;
                            reorg_finishes_at = stored_block_number;

                            if let Err(error) = contract
                                .tracker()
                                .update_latest_block(reorg_block_number, reorg_block_hash)
                                .await
                            {
                                error!(address = %address_label, %error, "error updating block tracker");
                            }

                            if reorg_tx.try_send(reorg_block_number).is_err() {
                                warn!(address = %address_label, "reorg signal dropped, channel not ready");
                            }

                            continue;
                        }
                    }
                }
            }

            // The check may have been skipped by an RPC failure; never store
            // a log the provider itself marked as removed.
            if removal_flagged {
                continue;
            }
        }

        if store_with_retry(contract.as_ref(), &log, &token, &address_label)
            .await
            .is_err()
        {
            continue;
        }

        info!(address = %address_label, block_number = event_block, "stored log");
        if let Some(block_hash) = log.block_hash {
            if let Err(error) = contract
                .tracker()
                .update_latest_block(event_block, block_hash)
                .await
            {
                error!(address = %address_label, %error, "error updating block tracker");
            }
        }
        metrics::record_log_processing_time(&address_label, started.elapsed().as_secs_f64());
    }

    debug!(address = %address_label, "exit dispatch loop");
}

/// Store one log, retrying recoverable failures every [`RETRY_SLEEP_TIME`]
/// until it succeeds, the error turns out non-recoverable, or shutdown is
/// signalled.
async fn store_with_retry(
    contract: &dyn Contract,
    log: &Log,
    token: &CancellationToken,
    address_label: &str,
) -> Result<(), StorageError> {
    loop {
        match contract.store_log(log).await {
            Ok(()) => return Ok(()),
            Err(error) => {
                error!(address = %address_label, %error, "error storing log");
                if !error.should_retry() {
                    metrics::record_abandoned_log(address_label);
                    return Err(error);
                }
                metrics::record_retryable_storage_error(address_label);

                tokio::select! {
                    () = token.cancelled() => return Err(error),
                    () = tokio::time::sleep(RETRY_SLEEP_TIME) => {}
                }
            }
        }
    }
}
