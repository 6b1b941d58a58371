//! Error types for the EVM log indexer.
//!
//! This module provides a unified error type [`IndexerError`] covering the
//! engine's own failures (configuration, RPC, persistence, reorg search) and
//! the storage-layer sum type [`StorageError`] that log storers return to the
//! dispatch loop.
//!
//! # Design
//!
//! [`IndexerError`] is organized by layer:
//! - [`IndexerError::ConfigError`]: configuration and environment issues
//! - [`IndexerError::RpcError`]: chain-RPC provider and network errors
//! - [`IndexerError::DatabaseError`]: persistence failures
//! - [`IndexerError::StateError`]: tracker/engine consistency errors
//!
//! plus three engine-specific variants with fixed meanings:
//! [`IndexerError::EmptyBlockHash`], [`IndexerError::BlockNotFound`], and
//! [`IndexerError::NoBlocksFound`] (reorg search exhausted the stored window
//! back to genesis without finding a canonical anchor).
//!
//! [`StorageError`] is deliberately a sum type rather than an error trait with
//! a boolean method: matching on `Recoverable`/`NonRecoverable` is exhaustive,
//! so a new storer cannot forget to classify its failures.

use std::fmt;

/// Result type alias using [`IndexerError`].
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Unified error type for the indexing engine.
#[derive(Debug)]
pub enum IndexerError {
    /// Configuration or environment variable errors.
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Chain-RPC provider or network errors.
    RpcError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database operation errors.
    DatabaseError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Engine state or consistency errors.
    StateError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A cursor update was attempted with an all-zero block hash.
    EmptyBlockHash,

    /// The chain client returned no block for the requested number.
    BlockNotFound {
        /// The block number that was requested
        number: u64,
    },

    /// Reorg search reached block 0 without finding a canonical anchor.
    NoBlocksFound,
}

impl IndexerError {
    /// Create a new configuration error.
    #[must_use]
    pub fn config(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new RPC error.
    #[must_use]
    pub fn rpc(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::RpcError {
            message: message.into(),
            source,
        }
    }

    /// Create a new database error.
    #[must_use]
    pub fn database(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source,
        }
    }

    /// Create a new state error.
    #[must_use]
    pub fn state(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::StateError {
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for IndexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::RpcError { message, .. } => write!(f, "RPC error: {message}"),
            Self::DatabaseError { message, .. } => write!(f, "Database error: {message}"),
            Self::StateError { message, .. } => write!(f, "State error: {message}"),
            Self::EmptyBlockHash => write!(f, "block hash is empty"),
            Self::BlockNotFound { number } => write!(f, "block {number} not found"),
            Self::NoBlocksFound => write!(f, "no blocks found"),
        }
    }
}

impl std::error::Error for IndexerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::RpcError { source, .. }
            | Self::DatabaseError { source, .. }
            | Self::StateError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::EmptyBlockHash | Self::BlockNotFound { .. } | Self::NoBlocksFound => None,
        }
    }
}

/// Convert from `eyre::Report` to `IndexerError`.
///
/// Used for wrapping reports that don't fit a specific category; the error is
/// categorized as an RPC error by default.
impl From<eyre::Report> for IndexerError {
    fn from(err: eyre::Report) -> Self {
        Self::RpcError {
            message: err.to_string(),
            source: None,
        }
    }
}

/// Classified failure returned by [`crate::contracts::LogStorer::store_log`].
///
/// The dispatch loop retries `Recoverable` errors with fixed backoff until
/// they succeed or the engine shuts down; `NonRecoverable` errors abandon the
/// log after a single attempt. Malformed payloads and failed validations are
/// the only things that should be non-recoverable.
#[derive(Debug)]
pub enum StorageError {
    /// Transient failure (DB contention, network hiccup); the same log will
    /// be submitted again.
    Recoverable {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Permanent failure (malformed log, decode failure, validation error);
    /// the log is abandoned.
    NonRecoverable {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Create a recoverable storage error.
    #[must_use]
    pub fn recoverable(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Recoverable {
            message: message.into(),
            source,
        }
    }

    /// Create a non-recoverable storage error.
    #[must_use]
    pub fn non_recoverable(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::NonRecoverable {
            message: message.into(),
            source,
        }
    }

    /// Whether the dispatch loop should retry the failed store.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        matches!(self, Self::Recoverable { .. })
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable { message, .. } => {
                write!(f, "Recoverable storage error: {message}")
            }
            Self::NonRecoverable { message, .. } => {
                write!(f, "Non-recoverable storage error: {message}")
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Recoverable { source, .. } | Self::NonRecoverable { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
        }
    }
}
