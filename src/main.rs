//! Binary entry point for the chain-log indexing engine.
//!
//! Wires the layers together and runs until interrupted:
//!
//! ```text
//! main.rs (Runtime Initialization)
//!     ↓
//! 1. Config Layer (src/config.rs)      → Load environment variables
//! 2. DB Layer (src/db/)                → Pool + migrations
//! 3. RPC Layer (src/rpc.rs)            → Create chain provider
//! 4. Contract Layer (src/contracts/)   → Tracker + reorg handler + storer
//! 5. Indexer (src/indexer.rs)          → Streamer and dispatch tasks
//! ```
//!
//! Shutdown is cooperative: Ctrl-C cancels the shared token and every task
//! drains before the process exits.

use std::sync::Arc;
use tracing::{error, info};

use evm_log_indexer::config::Config;
use evm_log_indexer::contracts::IndexedContract;
use evm_log_indexer::db::{self, repository::Repository};
use evm_log_indexer::indexer::Indexer;
use evm_log_indexer::observability;
use evm_log_indexer::rpc::{create_provider, HttpChainClient};
use evm_log_indexer::storer::EventLogStorer;

#[tokio::main]
async fn main() {
    // Initialize structured logging first. Controlled via:
    // - RUST_LOG: log level (e.g. "debug", "evm_log_indexer=trace,sqlx=warn")
    // - LOG_JSON: JSON output for production ("true" or "false")
    // - LOG_FILE: write logs to file with daily rotation
    let log_level = std::env::var("RUST_LOG").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    let _log_guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run().await {
        error!(error = %e, "Indexer error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    info!(
        chain_id = config.chain_id(),
        contract = ?config.contract_address(),
        start_block = config.start_block(),
        "starting chain-log indexer"
    );

    let pool = db::create_pool(config.database_url()).await?;
    let repository = Repository::new(pool);

    let provider = create_provider(config.rpc_url())?;
    let client = Arc::new(HttpChainClient::new(provider));

    let contract = IndexedContract::new(
        config.contract_address(),
        config.topics().to_vec(),
        config.start_block(),
        client.clone(),
        repository.clone(),
        Box::new(EventLogStorer::new(repository.clone())),
    )
    .await?;

    let mut indexer = Indexer::new(client)
        .backfill_blocks(config.backfill_blocks())
        .lag_from_head(config.lag_from_head());
    indexer.register_contract(Arc::new(contract));
    let running = indexer.start();

    tokio::signal::ctrl_c().await?;
    info!("interrupt received");
    running.shutdown().await;

    Ok(())
}
