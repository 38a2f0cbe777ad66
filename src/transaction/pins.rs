//! Pins held by one transaction.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DbResult;
use crate::storage::{BlockId, Buffer, BufferPool};

/// The buffers a transaction has pinned, with its own pin count per block.
///
/// This count is independent of the buffer's pin count in the pool, which
/// also includes pins by other transactions.
#[derive(Default)]
pub struct PinnedBuffers {
    buffers: HashMap<BlockId, Arc<Buffer>>,
    pins: HashMap<BlockId, usize>,
}

impl PinnedBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&mut self, pool: &BufferPool, block: &BlockId) -> DbResult<()> {
        let buffer = pool.pin(block)?;
        self.buffers.insert(block.clone(), buffer);
        *self.pins.entry(block.clone()).or_insert(0) += 1;
        Ok(())
    }

    /// Returns false if `block` is not pinned by this transaction.
    pub fn unpin(&mut self, pool: &BufferPool, block: &BlockId) -> bool {
        let Some(buffer) = self.buffers.get(block) else {
            return false;
        };
        pool.unpin(buffer);

        let count = self.pins.entry(block.clone()).or_insert(1);
        *count -= 1;
        if *count == 0 {
            self.pins.remove(block);
            self.buffers.remove(block);
        }
        true
    }

    /// Releases every pin this transaction still holds.
    pub fn unpin_all(&mut self, pool: &BufferPool) {
        for (block, count) in self.pins.drain() {
            if let Some(buffer) = self.buffers.remove(&block) {
                for _ in 0..count {
                    pool.unpin(&buffer);
                }
            }
        }
        self.buffers.clear();
    }

    pub fn buffer(&self, block: &BlockId) -> Option<&Arc<Buffer>> {
        self.buffers.get(block)
    }

    pub fn pin_count(&self, block: &BlockId) -> usize {
        self.pins.get(block).copied().unwrap_or(0)
    }

    pub fn is_pinned(&self, block: &BlockId) -> bool {
        self.pins.contains_key(block)
    }
}
