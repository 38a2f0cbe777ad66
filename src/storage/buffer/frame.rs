use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::{DbError, DbResult};
use crate::storage::{BlockId, BlockStore, LogManager, Lsn, Page};
use crate::transaction::TransactionId;

struct Frame {
    page: Page,
    block: Option<BlockId>,
    pins: u32,
    /// Transaction whose change is not yet on disk.
    modifying_tx: Option<TransactionId>,
    /// Most recent log record describing a change to this page.
    lsn: Option<Lsn>,
}

/// One slot of the buffer pool. It caches a single block at a time and is
/// reassigned to other blocks over its lifetime.
pub struct Buffer {
    index: usize,
    store: Arc<dyn BlockStore>,
    log: Arc<LogManager>,
    frame: Mutex<Frame>,
}

impl Buffer {
    pub(crate) fn new(index: usize, store: Arc<dyn BlockStore>, log: Arc<LogManager>) -> Self {
        let page = Page::new(store.block_size());
        Self {
            index,
            store,
            log,
            frame: Mutex::new(Frame {
                page,
                block: None,
                pins: 0,
                modifying_tx: None,
                lsn: None,
            }),
        }
    }

    /// Position of this buffer in its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Locks the page for reading. Do not hold the guard across other calls
    /// on this buffer.
    pub fn contents(&self) -> MappedMutexGuard<'_, Page> {
        MutexGuard::map(self.frame.lock(), |frame| &mut frame.page)
    }

    /// Applies `f` to the page and records `tx` as its modifier, atomically.
    /// `lsn` is the log record describing the change, if it was logged.
    pub fn modify<T>(
        &self,
        tx: TransactionId,
        lsn: Option<Lsn>,
        f: impl FnOnce(&mut Page) -> DbResult<T>,
    ) -> DbResult<T> {
        let mut frame = self.frame.lock();
        let result = f(&mut frame.page)?;
        Self::mark_modified(&mut frame, tx, lsn);
        Ok(result)
    }

    pub fn set_modified(&self, tx: TransactionId, lsn: Option<Lsn>) {
        Self::mark_modified(&mut self.frame.lock(), tx, lsn);
    }

    pub fn block(&self) -> Option<BlockId> {
        self.frame.lock().block.clone()
    }

    pub fn is_pinned(&self) -> bool {
        self.frame.lock().pins > 0
    }

    pub fn pin_count(&self) -> u32 {
        self.frame.lock().pins
    }

    pub fn modifying_tx(&self) -> Option<TransactionId> {
        self.frame.lock().modifying_tx
    }

    pub fn lsn(&self) -> Option<Lsn> {
        self.frame.lock().lsn
    }

    /// Writes the page to disk if it holds unflushed changes. The log is
    /// flushed up to the page's LSN first.
    pub fn flush(&self) -> DbResult<()> {
        self.flush_frame(&mut self.frame.lock())
    }

    /// Flushes only if `tx` is the buffer's outstanding modifier.
    pub(crate) fn flush_if_modified_by(&self, tx: TransactionId) -> DbResult<bool> {
        let mut frame = self.frame.lock();
        if frame.modifying_tx != Some(tx) {
            return Ok(false);
        }
        self.flush_frame(&mut frame)?;
        Ok(true)
    }

    /// Flushes the current contents, then loads `block`. Resets the pin count.
    pub(crate) fn assign_to_block(&self, block: BlockId) -> DbResult<()> {
        let mut frame = self.frame.lock();
        self.flush_frame(&mut frame)?;
        frame.block = None;
        frame.pins = 0;
        frame.lsn = None;
        self.store.read(&block, &mut frame.page)?;
        frame.block = Some(block);
        Ok(())
    }

    /// Returns true if the buffer went from unpinned to pinned.
    pub(crate) fn pin(&self) -> bool {
        let mut frame = self.frame.lock();
        frame.pins += 1;
        frame.pins == 1
    }

    /// Returns true if the buffer went from pinned to unpinned.
    pub(crate) fn unpin(&self) -> bool {
        let mut frame = self.frame.lock();
        if frame.pins == 0 {
            return false;
        }
        frame.pins -= 1;
        frame.pins == 0
    }

    pub(crate) fn holds(&self, block: &BlockId) -> bool {
        self.frame.lock().block.as_ref() == Some(block)
    }

    fn mark_modified(frame: &mut Frame, tx: TransactionId, lsn: Option<Lsn>) {
        frame.modifying_tx = Some(tx);
        if let Some(lsn) = lsn {
            frame.lsn = Some(lsn);
        }
    }

    fn flush_frame(&self, frame: &mut Frame) -> DbResult<()> {
        if frame.modifying_tx.is_none() {
            return Ok(());
        }
        if let Some(lsn) = frame.lsn {
            self.log.flush(lsn)?;
        }
        let block = frame.block.as_ref().ok_or(DbError::UnassignedBuffer)?;
        self.store.write(block, &frame.page)?;
        frame.modifying_tx = None;
        Ok(())
    }
}
