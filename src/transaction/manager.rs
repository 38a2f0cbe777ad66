//! The transaction handle.

use std::sync::Arc;

use log::{debug, warn};

use super::{PinnedBuffers, TransactionId, TransactionState};
use crate::concurrency::{LockManager, LockTable};
use crate::error::{DbError, DbResult};
use crate::recovery::{RecoveryManager, RecoveryStats};
use crate::storage::{BlockId, BlockStore, Buffer, BufferPool, LogManager};

/// One unit of work over the block store.
///
/// Reads take shared locks and writes take exclusive locks, all held until
/// the transaction ends. Blocks must be pinned before they are read or
/// written. Dropping a transaction that is still active rolls it back.
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    recovery: RecoveryManager,
    locks: LockManager,
    pins: PinnedBuffers,
    store: Arc<dyn BlockStore>,
    pool: Arc<BufferPool>,
}

impl Transaction {
    /// Starts a transaction. Writes its Start record to the log.
    pub fn new(
        id: TransactionId,
        store: Arc<dyn BlockStore>,
        log: Arc<LogManager>,
        pool: Arc<BufferPool>,
        lock_table: Arc<LockTable>,
    ) -> DbResult<Self> {
        let recovery = RecoveryManager::new(id, log, pool.clone())?;
        debug!("{} started", id);
        Ok(Self {
            id,
            state: TransactionState::Active,
            recovery,
            locks: LockManager::new(lock_table),
            pins: PinnedBuffers::new(),
            store,
            pool,
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn block_size(&self) -> usize {
        self.store.block_size()
    }

    /// Unpinned buffers left in the shared pool.
    pub fn available_buffers(&self) -> usize {
        self.pool.available()
    }

    pub fn is_pinned(&self, block: &BlockId) -> bool {
        self.pins.is_pinned(block)
    }

    pub fn pin(&mut self, block: &BlockId) -> DbResult<()> {
        self.pins.pin(&self.pool, block)
    }

    pub fn unpin(&mut self, block: &BlockId) -> DbResult<()> {
        if self.pins.unpin(&self.pool, block) {
            Ok(())
        } else {
            Err(self.not_pinned(block))
        }
    }

    pub fn get_int(&mut self, block: &BlockId, offset: usize) -> DbResult<i32> {
        self.locks.s_lock(block)?;
        let buffer = self.pinned(block)?;
        let value = buffer.contents().get_int(offset)?;
        Ok(value)
    }

    pub fn get_string(&mut self, block: &BlockId, offset: usize) -> DbResult<String> {
        self.locks.s_lock(block)?;
        let buffer = self.pinned(block)?;
        let value = buffer.contents().get_string(offset)?;
        Ok(value)
    }

    /// Writes `value` at `offset`. With `log` set, the old value is logged
    /// first so the change can be undone; undo itself writes unlogged.
    pub fn set_int(
        &mut self,
        block: &BlockId,
        offset: usize,
        value: i32,
        log: bool,
    ) -> DbResult<()> {
        self.locks.x_lock(block)?;
        let buffer = self.pinned(block)?;
        let lsn = if log {
            Some(self.recovery.set_int(&buffer, offset, value)?)
        } else {
            None
        };
        buffer.modify(self.id, lsn, |page| page.set_int(offset, value))
    }

    pub fn set_string(
        &mut self,
        block: &BlockId,
        offset: usize,
        value: &str,
        log: bool,
    ) -> DbResult<()> {
        self.locks.x_lock(block)?;
        let buffer = self.pinned(block)?;
        let lsn = if log {
            Some(self.recovery.set_string(&buffer, offset, value)?)
        } else {
            None
        };
        buffer.modify(self.id, lsn, |page| page.set_string(offset, value))
    }

    /// Writes raw bytes without logging. Used to undo string updates, whose
    /// old value may not be valid UTF-8.
    pub(crate) fn restore_bytes(
        &mut self,
        block: &BlockId,
        offset: usize,
        bytes: &[u8],
    ) -> DbResult<()> {
        self.locks.x_lock(block)?;
        let buffer = self.pinned(block)?;
        buffer.modify(self.id, None, |page| page.set_bytes(offset, bytes))
    }

    /// Number of blocks in `file_name`. Takes a shared lock on the file's
    /// end-of-file marker so no other transaction can append meanwhile.
    pub fn size(&mut self, file_name: &str) -> DbResult<u32> {
        self.locks.s_lock(&BlockId::end_of_file(file_name))?;
        self.store.length(file_name)
    }

    /// Appends a zeroed block to `file_name`. The new block is not pinned.
    pub fn append(&mut self, file_name: &str) -> DbResult<BlockId> {
        self.locks.x_lock(&BlockId::end_of_file(file_name))?;
        self.store.append(file_name)
    }

    pub fn commit(mut self) -> DbResult<()> {
        self.recovery.commit()?;
        self.state = TransactionState::Committed;
        self.finish();
        Ok(())
    }

    pub fn rollback(mut self) -> DbResult<()> {
        self.rollback_in_place()
    }

    /// Undoes unfinished transactions found in the log. Run once at startup,
    /// before any other transaction does work.
    pub fn recover(&mut self) -> DbResult<RecoveryStats> {
        self.pool.flush_all(self.id)?;
        let recovery = self.recovery.clone();
        recovery.recover(self)
    }

    fn rollback_in_place(&mut self) -> DbResult<()> {
        let recovery = self.recovery.clone();
        recovery.rollback(self)?;
        self.state = TransactionState::RolledBack;
        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        self.locks.release();
        self.pins.unpin_all(&self.pool);
    }

    fn pinned(&self, block: &BlockId) -> DbResult<Arc<Buffer>> {
        self.pins
            .buffer(block)
            .cloned()
            .ok_or_else(|| self.not_pinned(block))
    }

    fn not_pinned(&self, block: &BlockId) -> DbError {
        DbError::BlockNotPinned {
            block: block.clone(),
            tx: self.id,
        }
    }

    /// Simulates a crash: forces this transaction's buffers to disk and lets
    /// go of its locks and pins without writing Commit or Rollback.
    #[cfg(test)]
    pub(crate) fn crash(mut self) -> DbResult<()> {
        self.pool.flush_all(self.id)?;
        self.state = TransactionState::RolledBack;
        self.finish();
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.state.is_active() {
            return;
        }
        if let Err(e) = self.rollback_in_place() {
            warn!("Failed to roll back {} on drop: {}", self.id, e);
            // Do not leave locks or pins behind.
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::LockMode;
    use crate::config::DbConfig;
    use crate::database::Database;
    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    fn create_test_db(buffer_count: usize) -> Result<(Database, TempDir)> {
        let dir = tempdir()?;
        let config = DbConfig {
            data_dir: dir.path().join("txtest"),
            block_size: 400,
            buffer_count,
            pin_timeout_ms: 100,
            lock_timeout_ms: 100,
            ..DbConfig::default()
        };
        Ok((Database::open(config)?, dir))
    }

    fn setup_block(db: &Database) -> Result<BlockId> {
        let mut tx = db.new_transaction()?;
        let block = tx.append("testfile")?;
        tx.commit()?;
        Ok(block)
    }

    #[test]
    fn test_set_then_get() -> Result<()> {
        let (db, _dir) = create_test_db(8)?;
        let block = setup_block(&db)?;
        let mut tx = db.new_transaction()?;
        tx.pin(&block)?;
        tx.set_int(&block, 80, 42, true)?;
        tx.set_string(&block, 40, "hello", true)?;
        assert_eq!(tx.get_int(&block, 80)?, 42);
        assert_eq!(tx.get_string(&block, 40)?, "hello");
        assert_eq!(tx.state(), TransactionState::Active);
        tx.commit()?;
        Ok(())
    }

    #[test]
    fn test_commit_is_visible_to_later_transactions() -> Result<()> {
        let (db, _dir) = create_test_db(8)?;
        let block = setup_block(&db)?;
        let mut tx1 = db.new_transaction()?;
        tx1.pin(&block)?;
        tx1.set_int(&block, 0, 7, true)?;
        tx1.commit()?;

        let mut tx2 = db.new_transaction()?;
        tx2.pin(&block)?;
        assert_eq!(tx2.get_int(&block, 0)?, 7);
        tx2.commit()?;
        assert_eq!(db.buffer_pool().available(), 8);
        Ok(())
    }

    #[test]
    fn test_unpinned_access_is_an_error() -> Result<()> {
        let (db, _dir) = create_test_db(8)?;
        let block = setup_block(&db)?;
        let mut tx = db.new_transaction()?;
        let id = tx.id();

        assert!(matches!(
            tx.get_int(&block, 0),
            Err(DbError::BlockNotPinned { tx: owner, .. }) if owner == id
        ));
        assert!(matches!(
            tx.set_string(&block, 0, "x", true),
            Err(DbError::BlockNotPinned { .. })
        ));
        assert!(matches!(tx.unpin(&block), Err(DbError::BlockNotPinned { .. })));

        tx.pin(&block)?;
        tx.unpin(&block)?;
        assert!(!tx.is_pinned(&block));
        Ok(())
    }

    #[test]
    fn test_logged_string_over_binary_data_rolls_back() -> Result<()> {
        let (db, _dir) = create_test_db(8)?;
        let block = setup_block(&db)?;
        let mut tx1 = db.new_transaction()?;
        tx1.pin(&block)?;
        // Length prefix 2 followed by 0xff 0xff, which is not UTF-8.
        tx1.set_int(&block, 0, 2, true)?;
        tx1.set_int(&block, 4, -1, true)?;
        tx1.commit()?;

        let mut tx2 = db.new_transaction()?;
        tx2.pin(&block)?;
        tx2.set_string(&block, 0, "ok", true)?;
        assert_eq!(tx2.get_string(&block, 0)?, "ok");
        tx2.rollback()?;

        let mut tx3 = db.new_transaction()?;
        tx3.pin(&block)?;
        assert_eq!(tx3.get_int(&block, 0)?, 2);
        assert_eq!(tx3.get_int(&block, 4)?, -1);
        tx3.commit()?;
        Ok(())
    }

    #[test]
    fn test_drop_rolls_back() -> Result<()> {
        let (db, _dir) = create_test_db(8)?;
        let block = setup_block(&db)?;
        {
            let mut tx = db.new_transaction()?;
            tx.pin(&block)?;
            tx.set_int(&block, 0, 99, true)?;
        }

        let mut tx = db.new_transaction()?;
        tx.pin(&block)?;
        assert_eq!(tx.get_int(&block, 0)?, 0);
        tx.commit()?;
        assert_eq!(db.buffer_pool().available(), 8);
        Ok(())
    }

    #[test]
    fn test_writer_blocks_reader_until_commit() -> Result<()> {
        let (db, _dir) = create_test_db(8)?;
        let block = setup_block(&db)?;
        let mut writer = db.new_transaction()?;
        writer.pin(&block)?;
        writer.set_int(&block, 0, 1, true)?;

        let mut reader = db.new_transaction()?;
        reader.pin(&block)?;
        let err = reader.get_int(&block, 0).unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, DbError::LockAbort { mode: LockMode::Shared, .. }));

        writer.commit()?;
        assert_eq!(reader.get_int(&block, 0)?, 1);
        reader.commit()?;
        Ok(())
    }

    #[test]
    fn test_append_conflicts_with_size() -> Result<()> {
        let (db, _dir) = create_test_db(8)?;
        let mut reader = db.new_transaction()?;
        assert_eq!(reader.size("testfile")?, 0);

        let mut appender = db.new_transaction()?;
        assert!(appender.append("testfile").unwrap_err().is_timeout());
        appender.rollback()?;

        reader.commit()?;
        let mut appender = db.new_transaction()?;
        let block = appender.append("testfile")?;
        assert_eq!(block.number(), 0);
        assert_eq!(appender.size("testfile")?, 1);
        appender.commit()?;
        Ok(())
    }

    #[test]
    fn test_pin_times_out_when_pool_is_full() -> Result<()> {
        let (db, _dir) = create_test_db(3)?;
        let mut setup = db.new_transaction()?;
        let blocks: Vec<BlockId> = (0..4)
            .map(|_| setup.append("testfile"))
            .collect::<DbResult<_>>()?;
        setup.commit()?;

        let mut tx1 = db.new_transaction()?;
        let mut tx2 = db.new_transaction()?;
        tx1.pin(&blocks[0])?;
        tx1.pin(&blocks[1])?;
        tx2.pin(&blocks[2])?;
        assert!(matches!(tx2.pin(&blocks[3]), Err(DbError::BufferAbort(_))));

        tx1.unpin(&blocks[1])?;
        assert_eq!(tx2.available_buffers(), 1);
        tx2.pin(&blocks[3])?;
        assert!(tx2.is_pinned(&blocks[3]));
        tx1.commit()?;
        tx2.commit()?;
        Ok(())
    }

    #[test]
    fn test_block_size() -> Result<()> {
        let (db, _dir) = create_test_db(8)?;
        let tx = db.new_transaction()?;
        assert_eq!(tx.block_size(), 400);
        tx.rollback()?;
        Ok(())
    }
}
