//! Prometheus metrics for the indexing engine.
//!
//! Metrics are registered once in the default registry via `lazy_static` and
//! updated through the `record_*` helpers, keyed by contract address so a
//! multi-contract deployment can tell its streams apart.

// Registration can only fail on a duplicate metric name, which is a
// programming error caught the first time the process starts.
#![allow(clippy::unwrap_used)]

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};

lazy_static! {
    static ref LOGS_FOUND: IntCounterVec = register_int_counter_vec!(
        "indexer_logs_found_total",
        "Number of logs returned by eth_getLogs queries",
        &["contract_address"]
    )
    .unwrap();
    static ref CURRENT_BLOCK: IntGaugeVec = register_int_gauge_vec!(
        "indexer_current_block",
        "Highest block fully processed for a contract",
        &["contract_address"]
    )
    .unwrap();
    static ref MAX_BLOCK: IntGaugeVec = register_int_gauge_vec!(
        "indexer_chain_head_block",
        "Chain head block number as last observed",
        &["contract_address"]
    )
    .unwrap();
    static ref BLOCK_LAG: IntGaugeVec = register_int_gauge_vec!(
        "indexer_block_lag",
        "Distance between the chain head and the processed cursor",
        &["contract_address"]
    )
    .unwrap();
    static ref GET_LOGS_DURATION: HistogramVec = register_histogram_vec!(
        "indexer_get_logs_duration_seconds",
        "Duration of eth_getLogs requests",
        &["contract_address"]
    )
    .unwrap();
    static ref GET_LOGS_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "indexer_get_logs_requests_total",
        "Number of eth_getLogs requests issued",
        &["contract_address", "success"]
    )
    .unwrap();
    static ref RETRYABLE_STORAGE_ERRORS: IntCounterVec = register_int_counter_vec!(
        "indexer_retryable_storage_errors_total",
        "Recoverable storage errors that triggered a retry",
        &["contract_address"]
    )
    .unwrap();
    static ref ABANDONED_LOGS: IntCounterVec = register_int_counter_vec!(
        "indexer_abandoned_logs_total",
        "Logs dropped after a non-recoverable storage error",
        &["contract_address"]
    )
    .unwrap();
    static ref LOG_PROCESSING_DURATION: HistogramVec = register_histogram_vec!(
        "indexer_log_processing_duration_seconds",
        "Time from receiving a log to durably storing it",
        &["contract_address"]
    )
    .unwrap();
    static ref REORGS_DETECTED: IntCounterVec = register_int_counter_vec!(
        "indexer_reorgs_detected_total",
        "Chain reorganizations detected while indexing",
        &["contract_address"]
    )
    .unwrap();
}

/// Record the number of logs returned by one query page.
pub fn record_logs_found(contract_address: &str, count: u64) {
    LOGS_FOUND.with_label_values(&[contract_address]).inc_by(count);
}

/// Record the processed cursor and the observed chain head, plus their gap.
#[allow(clippy::cast_possible_wrap)]
pub fn record_block_position(contract_address: &str, current: u64, head: u64) {
    CURRENT_BLOCK
        .with_label_values(&[contract_address])
        .set(current as i64);
    MAX_BLOCK
        .with_label_values(&[contract_address])
        .set(head as i64);
    BLOCK_LAG
        .with_label_values(&[contract_address])
        .set(head.saturating_sub(current) as i64);
}

/// Record the outcome and duration of one `eth_getLogs` request.
pub fn record_get_logs_request(contract_address: &str, success: bool, duration_secs: f64) {
    GET_LOGS_REQUESTS
        .with_label_values(&[contract_address, if success { "true" } else { "false" }])
        .inc();
    GET_LOGS_DURATION
        .with_label_values(&[contract_address])
        .observe(duration_secs);
}

/// Record a recoverable storage error.
pub fn record_retryable_storage_error(contract_address: &str) {
    RETRYABLE_STORAGE_ERRORS
        .with_label_values(&[contract_address])
        .inc();
}

/// Record a log abandoned after a non-recoverable storage error.
pub fn record_abandoned_log(contract_address: &str) {
    ABANDONED_LOGS.with_label_values(&[contract_address]).inc();
}

/// Record end-to-end processing time for one log.
pub fn record_log_processing_time(contract_address: &str, duration_secs: f64) {
    LOG_PROCESSING_DURATION
        .with_label_values(&[contract_address])
        .observe(duration_secs);
}

/// Record a detected reorg.
pub fn record_reorg_detected(contract_address: &str) {
    REORGS_DETECTED.with_label_values(&[contract_address]).inc();
}
