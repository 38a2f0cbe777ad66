//! Log manager implementation.
//!
//! The log manager owns the tail block of the log file and one page that
//! mirrors it. Appends only touch the page; `flush` writes the whole page
//! back to its block.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::{read_boundary, LogIterator, Lsn, INT_SIZE};
use crate::error::{DbError, DbResult};
use crate::storage::{BlockId, BlockStore, Page};

/// Mutable state of the log, guarded by a single mutex.
struct LogTail {
    page: Page,
    block: BlockId,
    /// LSN of the last record appended.
    latest_lsn: Lsn,
    /// LSN of the last record written to disk.
    last_saved_lsn: Lsn,
}

pub struct LogManager {
    store: Arc<dyn BlockStore>,
    log_file: String,
    tail: Mutex<LogTail>,
}

impl LogManager {
    /// Opens the log file, creating its first block when the file is empty.
    pub fn new(store: Arc<dyn BlockStore>, log_file: &str) -> DbResult<Self> {
        let mut page = Page::new(store.block_size());
        let len = store.length(log_file)?;
        let block = if len == 0 {
            Self::append_new_block(store.as_ref(), log_file, &mut page)?
        } else {
            let block = BlockId::new(log_file, len - 1);
            store.read(&block, &mut page)?;
            // A crash right after appending the block leaves it zeroed.
            if page.get_int(0)? == 0 {
                debug!("Log tail {} was never initialized", block);
                page.set_int(0, store.block_size() as i32)?;
            }
            block
        };

        Ok(Self {
            store,
            log_file: log_file.to_string(),
            tail: Mutex::new(LogTail {
                page,
                block,
                latest_lsn: Lsn::default(),
                last_saved_lsn: Lsn::default(),
            }),
        })
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    /// Appends a record and returns its LSN. The record is only durable once
    /// `flush` has been called with this LSN or a later one.
    pub fn append(&self, record: &[u8]) -> DbResult<Lsn> {
        let block_size = self.store.block_size();
        let needed = record.len() + INT_SIZE;
        if needed + INT_SIZE > block_size {
            return Err(DbError::LogRecordTooLarge {
                size: record.len(),
                block_size,
            });
        }

        let mut tail = self.tail.lock();
        let mut boundary = read_boundary(&tail.page)?;
        if boundary < needed + INT_SIZE {
            self.write_tail(&mut tail)?;
            let LogTail { page, block, .. } = &mut *tail;
            *block = Self::append_new_block(self.store.as_ref(), &self.log_file, page)?;
            debug!("Log moved to {}", block);
            boundary = read_boundary(&tail.page)?;
        }

        let position = boundary - needed;
        tail.page.set_bytes(position, record)?;
        tail.page.set_int(0, position as i32)?;
        tail.latest_lsn = tail.latest_lsn.next();
        Ok(tail.latest_lsn)
    }

    /// Makes every record up to `lsn` durable. Writes the whole tail block.
    pub fn flush(&self, lsn: Lsn) -> DbResult<()> {
        let mut tail = self.tail.lock();
        if lsn >= tail.last_saved_lsn {
            self.write_tail(&mut tail)?;
        }
        Ok(())
    }

    /// Returns an iterator over all records, newest first.
    pub fn iterator(&self) -> DbResult<LogIterator> {
        let mut tail = self.tail.lock();
        self.write_tail(&mut tail)?;
        LogIterator::new(self.store.clone(), tail.block.clone())
    }

    pub fn latest_lsn(&self) -> Lsn {
        self.tail.lock().latest_lsn
    }

    pub fn last_saved_lsn(&self) -> Lsn {
        self.tail.lock().last_saved_lsn
    }

    fn write_tail(&self, tail: &mut LogTail) -> DbResult<()> {
        self.store.write(&tail.block, &tail.page)?;
        tail.last_saved_lsn = tail.latest_lsn;
        Ok(())
    }

    fn append_new_block(
        store: &dyn BlockStore,
        log_file: &str,
        page: &mut Page,
    ) -> DbResult<BlockId> {
        let block = store.append(log_file)?;
        page.contents_mut().fill(0);
        page.set_int(0, store.block_size() as i32)?;
        store.write(&block, page)?;
        Ok(block)
    }
}
