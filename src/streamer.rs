//! Paged log streaming from the chain into bounded channels.
//!
//! A [`LogStreamer`] runs one worker per watched contract. Each worker pulls
//! logs in bounded pages with `eth_getLogs`, delivers them in order over a
//! bounded channel, and keeps polling at the head. Query failures retry the
//! same page after a short sleep; empty pages and an idle head back off
//! for longer. A
//! rewind channel lets the consumer push the worker back to just after a
//! reorg point.

use alloy::primitives::{Address, B256};
use alloy::rpc::types::{Filter, Log};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics;
use crate::rpc::ChainClient;

/// Default maximum blocks per `eth_getLogs` page.
pub const BACKFILL_BLOCKS: u64 = 1000;

/// Default safety margin of blocks left unprocessed below the head.
pub const LAG_FROM_HIGHEST_BLOCK: u64 = 0;

/// Sleep after a failed RPC call before retrying the same page.
const ERROR_SLEEP_TIME: Duration = Duration::from_millis(100);

/// Sleep after a page with no logs or when caught up with the chain head.
const NO_LOGS_SLEEP_TIME: Duration = Duration::from_secs(1);

/// Capacity of each per-contract log channel.
const LOG_CHANNEL_CAPACITY: usize = 100;

/// What one worker watches: a contract, its topic filter, and where to start.
#[derive(Debug, Clone)]
pub struct ContractConfig {
    /// Contract emitting the logs
    pub address: Address,
    /// topic0 filters; empty means every event from the contract
    pub topics: Vec<B256>,
    /// First block the worker queries
    pub from_block: u64,
}

struct Watcher {
    config: ContractConfig,
    sender: mpsc::Sender<Log>,
    reorg_rx: mpsc::Receiver<u64>,
}

/// Builder that registers contracts before the streamer starts.
pub struct LogStreamBuilder {
    client: Arc<dyn ChainClient>,
    backfill_blocks: u64,
    lag_from_head: u64,
    watchers: Vec<Watcher>,
}

impl LogStreamBuilder {
    /// Create a builder over the given chain client with default paging.
    #[must_use]
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self {
            client,
            backfill_blocks: BACKFILL_BLOCKS,
            lag_from_head: LAG_FROM_HIGHEST_BLOCK,
            watchers: Vec::new(),
        }
    }

    /// Override the page size.
    #[must_use]
    pub const fn backfill_blocks(mut self, blocks: u64) -> Self {
        self.backfill_blocks = blocks;
        self
    }

    /// Override the safety margin below the chain head.
    #[must_use]
    pub const fn lag_from_head(mut self, blocks: u64) -> Self {
        self.lag_from_head = blocks;
        self
    }

    /// Register a contract to watch.
    ///
    /// Returns the receiving end of the bounded log channel and a rewind
    /// sender: pushing a block number there makes the worker restart its
    /// paging from the block after it.
    pub fn listen_for_contract_events(
        &mut self,
        config: ContractConfig,
    ) -> (mpsc::Receiver<Log>, mpsc::Sender<u64>) {
        let (sender, receiver) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let (reorg_tx, reorg_rx) = mpsc::channel(1);
        self.watchers.push(Watcher {
            config,
            sender,
            reorg_rx,
        });
        (receiver, reorg_tx)
    }

    /// Finish the builder.
    #[must_use]
    pub fn build(self) -> LogStreamer {
        LogStreamer {
            client: self.client,
            backfill_blocks: self.backfill_blocks,
            lag_from_head: self.lag_from_head,
            watchers: self.watchers,
        }
    }
}

/// Runs one paging worker per registered contract.
pub struct LogStreamer {
    client: Arc<dyn ChainClient>,
    backfill_blocks: u64,
    lag_from_head: u64,
    watchers: Vec<Watcher>,
}

impl LogStreamer {
    /// Spawn every worker onto the given [`JoinSet`]. Workers stop when the
    /// token is cancelled or their consumer drops the receiving end.
    pub fn spawn(self, token: &CancellationToken, tasks: &mut JoinSet<()>) {
        for watcher in self.watchers {
            let client = Arc::clone(&self.client);
            let token = token.clone();
            let backfill_blocks = self.backfill_blocks;
            let lag_from_head = self.lag_from_head;
            tasks.spawn(async move {
                watch_contract(client, watcher, backfill_blocks, lag_from_head, token).await;
            });
        }
    }
}

async fn watch_contract(
    client: Arc<dyn ChainClient>,
    mut watcher: Watcher,
    backfill_blocks: u64,
    lag_from_head: u64,
    token: CancellationToken,
) {
    let address_label = format!("{:?}", watcher.config.address);
    let mut from_block = watcher.config.from_block;

    info!(
        address = %address_label,
        from_block,
        "starting log stream worker"
    );

    loop {
        if token.is_cancelled() {
            break;
        }

        // A pending rewind takes effect before the next page is queried.
        if let Ok(reorg_point) = watcher.reorg_rx.try_recv() {
            info!(
                address = %address_label,
                reorg_point,
                "rewinding stream past reorg point"
            );
            from_block = reorg_point + 1;
        }

        let highest = match client.block_number().await {
            Ok(head) => head.saturating_sub(lag_from_head),
            Err(error) => {
                error!(address = %address_label, %error, "failed to fetch chain head");
                if sleep_or_cancel(&token, ERROR_SLEEP_TIME).await {
                    break;
                }
                continue;
            }
        };

        let Some((from, to)) = next_page(from_block, highest, backfill_blocks) else {
            // Caught up with the head; wait for new blocks.
            if sleep_or_cancel(&token, NO_LOGS_SLEEP_TIME).await {
                break;
            }
            continue;
        };

        let filter = build_filter(&watcher.config, from, to);
        let started = Instant::now();
        let logs = match client.get_logs(&filter).await {
            Ok(logs) => {
                metrics::record_get_logs_request(
                    &address_label,
                    true,
                    started.elapsed().as_secs_f64(),
                );
                logs
            }
            Err(error) => {
                metrics::record_get_logs_request(
                    &address_label,
                    false,
                    started.elapsed().as_secs_f64(),
                );
                error!(
                    address = %address_label,
                    from, to, %error,
                    "eth_getLogs failed, retrying same range"
                );
                if sleep_or_cancel(&token, ERROR_SLEEP_TIME).await {
                    break;
                }
                continue;
            }
        };

        let logs_found = logs.len() as u64;
        metrics::record_logs_found(&address_label, logs_found);
        debug!(
            address = %address_label,
            from, to,
            count = logs_found,
            "fetched log page"
        );

        for log in logs {
            tokio::select! {
                () = token.cancelled() => return,
                sent = watcher.sender.send(log) => {
                    if sent.is_err() {
                        info!(address = %address_label, "log consumer gone, stopping worker");
                        return;
                    }
                }
            }
        }

        metrics::record_block_position(&address_label, to, highest);
        from_block = to + 1;

        // Back off after an empty page or on reaching the head; pages with
        // logs keep paging at full speed.
        if logs_found == 0 || caught_up(from_block, highest) {
            if sleep_or_cancel(&token, NO_LOGS_SLEEP_TIME).await {
                break;
            }
        }
    }

    info!(address = %address_label, "log stream worker stopped");
}

/// Bounds of the next page, or `None` when the worker has caught up.
const fn next_page(from: u64, highest: u64, backfill_blocks: u64) -> Option<(u64, u64)> {
    if highest < from {
        return None;
    }
    let span = from + backfill_blocks.saturating_sub(1);
    let to = if span < highest { span } else { highest };
    Some((from, to))
}

const fn caught_up(next_from: u64, highest: u64) -> bool {
    next_from > highest
}

fn build_filter(config: &ContractConfig, from: u64, to: u64) -> Filter {
    let mut filter = Filter::new()
        .address(config.address)
        .from_block(from)
        .to_block(to);
    if !config.topics.is_empty() {
        filter = filter.event_signature(config.topics.clone());
    }
    filter
}

/// Sleep for `duration` unless the token fires first; true means cancelled.
async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        () = token.cancelled() => true,
        () = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_page_bounded_by_backfill() {
        assert_eq!(next_page(0, 5000, 1000), Some((0, 999)));
        assert_eq!(next_page(1000, 5000, 1000), Some((1000, 1999)));
    }

    #[test]
    fn test_next_page_clamped_to_head() {
        assert_eq!(next_page(4500, 5000, 1000), Some((4500, 5000)));
        assert_eq!(next_page(5000, 5000, 1000), Some((5000, 5000)));
    }

    #[test]
    fn test_next_page_none_when_caught_up() {
        assert_eq!(next_page(5001, 5000, 1000), None);
    }

    #[test]
    fn test_build_filter_without_topics() {
        let config = ContractConfig {
            address: Address::repeat_byte(0x22),
            topics: Vec::new(),
            from_block: 0,
        };
        let filter = build_filter(&config, 10, 20);
        assert_eq!(filter.get_from_block(), Some(10));
        assert_eq!(filter.get_to_block(), Some(20));
    }
}
