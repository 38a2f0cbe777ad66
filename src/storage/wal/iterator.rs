use std::sync::Arc;

use super::read_boundary;
use crate::error::DbResult;
use crate::storage::{BlockId, BlockStore, Page};

/// Walks the log from its newest record back to its oldest.
///
/// Within a block the cursor starts at the boundary and moves towards the end
/// of the block; once a block is exhausted the previous block is loaded.
pub struct LogIterator {
    store: Arc<dyn BlockStore>,
    block: BlockId,
    page: Page,
    position: usize,
    done: bool,
}

impl LogIterator {
    pub(crate) fn new(store: Arc<dyn BlockStore>, block: BlockId) -> DbResult<Self> {
        let mut page = Page::new(store.block_size());
        store.read(&block, &mut page)?;
        let position = read_boundary(&page)?;
        Ok(Self {
            store,
            block,
            page,
            position,
            done: false,
        })
    }

    fn next_record(&mut self) -> DbResult<Option<Vec<u8>>> {
        while self.position >= self.page.size() {
            if self.block.number() == 0 {
                return Ok(None);
            }
            self.block = BlockId::new(self.block.file_name(), self.block.number() - 1);
            self.store.read(&self.block, &mut self.page)?;
            self.position = read_boundary(&self.page)?;
        }

        let record = self.page.get_bytes(self.position)?.to_vec();
        self.position += Page::max_length(record.len());
        Ok(Some(record))
    }
}

impl Iterator for LogIterator {
    type Item = DbResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
