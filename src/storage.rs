//! Storage layer implementation for blockdb.
//!
//! This module provides the block-structured foundation the transaction layer
//! builds on. Key components:
//!
//! - **BlockId**: `(file name, block number)` address of a fixed-size block
//! - **Page**: a block-sized byte buffer with typed big-endian accessors
//! - **BlockStore / FileManager**: reads, writes and appends blocks on disk
//! - **LogManager**: the append-only write-ahead log with a reverse iterator
//! - **BufferPool**: a fixed set of pin-counted buffers caching blocks
//!
//! Buffers never reach disk before the log records describing their changes.

pub mod block;
pub mod buffer;
pub mod disk;
pub mod page;
pub mod wal;

pub use block::BlockId;
pub use buffer::{Buffer, BufferPool, LruReplacer, NaiveReplacer, Replacer};
pub use disk::{BlockStore, FileManager};
pub use page::Page;
pub use wal::{LogIterator, LogManager, Lsn};
