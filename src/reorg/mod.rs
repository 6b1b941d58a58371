//! Chain reorganization detection and recovery.
//!
//! When the dispatch loop sees a block hash that contradicts what it stored
//! earlier, the [`handler::ReorgHandler`] walks back through the persisted
//! block window to find the last block both the database and the chain agree
//! on. Indexing then rewinds to just after that point.

pub mod handler;

pub use handler::ReorgHandler;

/// Width of the search window, in blocks, examined per round while walking
/// back to find the last common ancestor.
pub const BLOCK_RANGE_SIZE: u64 = 600;
