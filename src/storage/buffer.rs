pub mod frame;
pub mod lru;
pub mod replacer;

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::error::{DbError, DbResult};
use crate::storage::{BlockId, BlockStore, LogManager};
use crate::transaction::TransactionId;

pub use frame::Buffer;
pub use lru::LruReplacer;
pub use replacer::{NaiveReplacer, Replacer};

struct PoolState {
    num_available: usize,
    replacer: Box<dyn Replacer>,
}

/// Fixed-size pool of buffers. At most one buffer is mapped to a given block.
pub struct BufferPool {
    buffers: Vec<Arc<Buffer>>,
    state: Mutex<PoolState>,
    unpinned: Condvar,
    max_wait: Duration,
}

impl BufferPool {
    pub fn new(
        store: Arc<dyn BlockStore>,
        log: Arc<LogManager>,
        num_buffers: usize,
        max_wait: Duration,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        let buffers = (0..num_buffers)
            .map(|index| Arc::new(Buffer::new(index, store.clone(), log.clone())))
            .collect();
        Self {
            buffers,
            state: Mutex::new(PoolState {
                num_available: num_buffers,
                replacer,
            }),
            unpinned: Condvar::new(),
            max_wait,
        }
    }

    /// Pins a buffer to `block`, waiting up to the pool's max wait for one
    /// to become free.
    pub fn pin(&self, block: &BlockId) -> DbResult<Arc<Buffer>> {
        let deadline = Instant::now() + self.max_wait;
        let Some(mut state) = self.state.try_lock_until(deadline) else {
            warn!("Timed out acquiring the buffer pool to pin {}", block);
            return Err(DbError::BufferAbort(block.clone()));
        };

        loop {
            if let Some(buffer) = self.try_pin(&mut state, block)? {
                return Ok(buffer);
            }
            if self.unpinned.wait_until(&mut state, deadline).timed_out() {
                // A buffer may have been released right at the deadline.
                return match self.try_pin(&mut state, block)? {
                    Some(buffer) => Ok(buffer),
                    None => {
                        warn!("No buffer became available to pin {}", block);
                        Err(DbError::BufferAbort(block.clone()))
                    }
                };
            }
        }
    }

    pub fn unpin(&self, buffer: &Buffer) {
        let mut state = self.state.lock();
        if buffer.unpin() {
            state.num_available += 1;
            state.replacer.unpinned(buffer.index());
            self.unpinned.notify_all();
        }
    }

    /// Flushes every buffer whose outstanding changes belong to `tx`.
    pub fn flush_all(&self, tx: TransactionId) -> DbResult<()> {
        let _state = self.state.lock();
        let mut flushed = 0;
        for buffer in &self.buffers {
            if buffer.flush_if_modified_by(tx)? {
                flushed += 1;
            }
        }
        debug!("Flushed {} buffers modified by {}", flushed, tx);
        Ok(())
    }

    /// Number of buffers that are currently unpinned.
    pub fn available(&self) -> usize {
        self.state.lock().num_available
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    fn try_pin(&self, state: &mut PoolState, block: &BlockId) -> DbResult<Option<Arc<Buffer>>> {
        let buffer = match self.find_existing(block) {
            Some(buffer) => buffer,
            None => {
                let Some(index) = state.replacer.victim(&self.buffers) else {
                    return Ok(None);
                };
                let buffer = &self.buffers[index];
                match buffer.block() {
                    Some(old) => debug!("Buffer {} evicts {} for {}", index, old, block),
                    None => debug!("Buffer {} assigned to {}", index, block),
                }
                buffer.assign_to_block(block.clone())?;
                buffer.clone()
            }
        };

        if buffer.pin() {
            state.num_available -= 1;
        }
        Ok(Some(buffer))
    }

    fn find_existing(&self, block: &BlockId) -> Option<Arc<Buffer>> {
        self.buffers.iter().find(|buffer| buffer.holds(block)).cloned()
    }
}
