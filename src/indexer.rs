//! Top-level orchestration: one streamer worker and one dispatch loop per
//! registered contract, sharing a cancellation token and a task set.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::contracts::Contract;
use crate::dispatch;
use crate::rpc::ChainClient;
use crate::streamer::{ContractConfig, LogStreamBuilder};

/// Builder phase of the indexer: contracts are registered, then [`start`]
/// wires streams to dispatch loops and spawns everything.
///
/// [`start`]: Indexer::start
pub struct Indexer {
    client: Arc<dyn ChainClient>,
    builder: LogStreamBuilder,
    pending: Vec<PendingContract>,
    token: CancellationToken,
}

struct PendingContract {
    contract: Arc<dyn Contract>,
    receiver: mpsc::Receiver<alloy::rpc::types::Log>,
    reorg_tx: mpsc::Sender<u64>,
}

impl Indexer {
    /// Create an indexer over the given chain client.
    #[must_use]
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        let builder = LogStreamBuilder::new(Arc::clone(&client));
        Self {
            client,
            builder,
            pending: Vec::new(),
            token: CancellationToken::new(),
        }
    }

    /// Override the streamer's page size.
    #[must_use]
    pub fn backfill_blocks(mut self, blocks: u64) -> Self {
        self.builder = self.builder.backfill_blocks(blocks);
        self
    }

    /// Override the streamer's safety margin below the chain head.
    #[must_use]
    pub fn lag_from_head(mut self, blocks: u64) -> Self {
        self.builder = self.builder.lag_from_head(blocks);
        self
    }

    /// Register a contract. Its stream resumes from the tracked cursor (or
    /// the deployment block, whichever is later), so the cursor's own block
    /// is re-delivered; storers are idempotent and absorb the overlap.
    pub fn register_contract(&mut self, contract: Arc<dyn Contract>) {
        let (cursor_block, _) = contract.tracker().get_latest_block();
        let from_block = cursor_block.max(contract.start_block());
        let config = ContractConfig {
            address: contract.address(),
            topics: contract.topics().to_vec(),
            from_block,
        };
        let (receiver, reorg_tx) = self.builder.listen_for_contract_events(config);
        info!(
            address = ?contract.address(),
            from_block,
            start_block = contract.start_block(),
            "registered contract"
        );
        self.pending.push(PendingContract {
            contract,
            receiver,
            reorg_tx,
        });
    }

    /// Spawn the streamer workers and dispatch loops.
    pub fn start(self) -> RunningIndexer {
        let mut tasks = JoinSet::new();

        for pending in self.pending {
            let client = Arc::clone(&self.client);
            let token = self.token.clone();
            tasks.spawn(async move {
                dispatch::index_logs(
                    client,
                    pending.receiver,
                    pending.reorg_tx,
                    pending.contract,
                    token,
                )
                .await;
            });
        }

        self.builder.build().spawn(&self.token, &mut tasks);

        info!("indexer started");

        RunningIndexer {
            token: self.token,
            tasks,
        }
    }
}

/// Handle over a started indexer.
pub struct RunningIndexer {
    token: CancellationToken,
    tasks: JoinSet<()>,
}

impl RunningIndexer {
    /// Signal shutdown and wait for every task to drain.
    pub async fn shutdown(mut self) {
        info!("shutting down indexer");
        self.token.cancel();
        while self.tasks.join_next().await.is_some() {}
        info!("indexer stopped");
    }

    /// Wait for all tasks to finish on their own (for example when every
    /// stream consumer has gone away).
    pub async fn wait(mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}
