//! Per-transaction lock bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use super::{LockMode, LockTable};
use crate::error::{DbError, DbResult};
use crate::storage::BlockId;

/// Tracks the locks one transaction holds in the shared [`LockTable`].
///
/// Locks are acquired on demand and kept until [`release`](Self::release),
/// which the transaction calls when it commits or rolls back.
#[derive(Debug)]
pub struct LockManager {
    table: Arc<LockTable>,
    held: HashMap<BlockId, LockMode>,
}

impl LockManager {
    pub fn new(table: Arc<LockTable>) -> Self {
        Self {
            table,
            held: HashMap::new(),
        }
    }

    /// Acquires a shared lock unless any lock on `block` is already held.
    pub fn s_lock(&mut self, block: &BlockId) -> DbResult<()> {
        if self.held.contains_key(block) {
            return Ok(());
        }
        if !self.table.lock_shared(block) {
            return Err(self.abort(block, LockMode::Shared));
        }
        self.held.insert(block.clone(), LockMode::Shared);
        Ok(())
    }

    /// Acquires an exclusive lock.
    ///
    /// A held shared lock is released before the exclusive lock is requested,
    /// so another transaction may slip in between. If the request then times
    /// out, the transaction holds no lock on `block` at all.
    pub fn x_lock(&mut self, block: &BlockId) -> DbResult<()> {
        match self.held.get(block) {
            Some(LockMode::Exclusive) => return Ok(()),
            Some(LockMode::Shared) => {
                debug!("Upgrading lock on {}", block);
                self.s_unlock(block);
            }
            None => {}
        }
        if !self.table.lock_exclusive(block) {
            return Err(self.abort(block, LockMode::Exclusive));
        }
        self.held.insert(block.clone(), LockMode::Exclusive);
        Ok(())
    }

    /// Releases a shared lock. Does nothing if `block` is held exclusively.
    pub fn s_unlock(&mut self, block: &BlockId) {
        self.unlock(block, LockMode::Shared);
    }

    /// Releases an exclusive lock. Does nothing if `block` is held shared.
    pub fn x_unlock(&mut self, block: &BlockId) {
        self.unlock(block, LockMode::Exclusive);
    }

    /// Releases every lock held.
    pub fn release(&mut self) {
        for (block, mode) in self.held.drain() {
            Self::unlock_in_table(&self.table, &block, mode);
        }
    }

    pub fn held(&self, block: &BlockId) -> Option<LockMode> {
        self.held.get(block).copied()
    }

    fn unlock(&mut self, block: &BlockId, mode: LockMode) {
        if self.held.get(block) != Some(&mode) {
            return;
        }
        self.held.remove(block);
        Self::unlock_in_table(&self.table, block, mode);
    }

    fn unlock_in_table(table: &LockTable, block: &BlockId, mode: LockMode) {
        match mode {
            LockMode::Shared => table.unlock_shared(block),
            LockMode::Exclusive => table.unlock_exclusive(block),
        }
    }

    fn abort(&self, block: &BlockId, mode: LockMode) -> DbError {
        warn!(
            "Timed out after {:?} waiting for {} lock on {}",
            self.table.timeout(),
            mode,
            block
        );
        DbError::LockAbort {
            block: block.clone(),
            mode,
        }
    }
}
