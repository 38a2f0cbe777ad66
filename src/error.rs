//! Error types shared by every layer of the engine.

use thiserror::Error;

use crate::concurrency::LockMode;
use crate::storage::block::BlockId;
use crate::transaction::TransactionId;

/// Errors that can occur in the storage and transaction layers.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Offset {offset} with length {len} overflows a page of {size} bytes")]
    PageOverflow {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Invalid UTF-8 string at page offset {offset}")]
    InvalidString { offset: usize },

    #[error("Timed out waiting for a free buffer to pin {0}")]
    BufferAbort(BlockId),

    #[error("Unable to acquire {mode} lock on {block}")]
    LockAbort { block: BlockId, mode: LockMode },

    #[error("Block {block} is not pinned by {tx}")]
    BlockNotPinned { block: BlockId, tx: TransactionId },

    #[error("Buffer is not assigned to any block")]
    UnassignedBuffer,

    #[error("Malformed log record: unknown operation tag {0}")]
    UnknownLogTag(i32),

    #[error("Malformed log record: {0}")]
    MalformedLogRecord(String),

    #[error("Log record of {size} bytes does not fit in a {block_size}-byte log block")]
    LogRecordTooLarge { size: usize, block_size: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Returns true for bounded-wait failures. The caller is expected to roll
    /// the transaction back.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::BufferAbort(_) | Self::LockAbort { .. })
    }
}

/// Result type for engine operations.
pub type DbResult<T> = Result<T, DbError>;
