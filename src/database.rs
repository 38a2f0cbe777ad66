use std::sync::Arc;

use log::info;

use crate::concurrency::LockTable;
use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::recovery::RecoveryStats;
use crate::storage::{BlockStore, BufferPool, FileManager, LogManager};
use crate::transaction::{Transaction, TransactionIdGenerator};

/// Owns the components shared by all transactions.
pub struct Database {
    config: DbConfig,
    store: Arc<dyn BlockStore>,
    log: Arc<LogManager>,
    pool: Arc<BufferPool>,
    locks: Arc<LockTable>,
    ids: TransactionIdGenerator,
}

impl Database {
    /// Opens the database in `config.data_dir`, creating it if needed. An
    /// existing database is recovered before this returns.
    pub fn open(config: DbConfig) -> DbResult<Self> {
        config.validate()?;
        let fm = FileManager::new(&config.data_dir, config.block_size)?;
        let is_new = fm.is_new();
        let db = Self::with_store(config, Arc::new(fm))?;

        if is_new {
            info!("Created new database in {}", db.config.data_dir.display());
        } else {
            info!("Recovering existing database in {}", db.config.data_dir.display());
            db.recover()?;
        }
        Ok(db)
    }

    /// Builds the database over an arbitrary block store. No recovery is run.
    pub fn with_store(config: DbConfig, store: Arc<dyn BlockStore>) -> DbResult<Self> {
        config.validate()?;
        if store.block_size() != config.block_size {
            return Err(DbError::Config(format!(
                "store uses {}-byte blocks but the config asks for {}",
                store.block_size(),
                config.block_size
            )));
        }

        let log = Arc::new(LogManager::new(store.clone(), &config.log_file)?);
        let pool = Arc::new(BufferPool::new(
            store.clone(),
            log.clone(),
            config.buffer_count,
            config.pin_timeout(),
            config.replacement.build(),
        ));
        let locks = Arc::new(LockTable::new(config.lock_timeout()));

        Ok(Self {
            config,
            store,
            log,
            pool,
            locks,
            ids: TransactionIdGenerator::new(),
        })
    }

    pub fn new_transaction(&self) -> DbResult<Transaction> {
        Transaction::new(
            self.ids.next(),
            self.store.clone(),
            self.log.clone(),
            self.pool.clone(),
            self.locks.clone(),
        )
    }

    /// Runs recovery in a fresh transaction and commits it.
    pub fn recover(&self) -> DbResult<RecoveryStats> {
        let mut tx = self.new_transaction()?;
        let stats = tx.recover()?;
        tx.commit()?;
        Ok(stats)
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn block_store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn lock_table(&self) -> &Arc<LockTable> {
        &self.locks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::LogRecord;
    use crate::storage::BlockId;
    use anyhow::Result;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> DbConfig {
        DbConfig {
            data_dir: dir.join("dbtest"),
            pin_timeout_ms: 200,
            lock_timeout_ms: 200,
            ..DbConfig::default()
        }
    }

    #[test]
    fn test_new_database_skips_recovery() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::open(test_config(dir.path()))?;
        assert!(db.log_manager().iterator()?.next().is_none());
        assert_eq!(db.buffer_pool().buffer_count(), 8);
        Ok(())
    }

    #[test]
    fn test_reopen_runs_recovery() -> Result<()> {
        let dir = tempdir()?;
        let config = test_config(dir.path());
        {
            let db = Database::open(config.clone())?;
            let mut tx = db.new_transaction()?;
            let block = tx.append("testfile")?;
            tx.pin(&block)?;
            tx.set_int(&block, 0, 11, true)?;
            tx.commit()?;
        }

        let db = Database::open(config)?;
        let mut records = db.log_manager().iterator()?;
        let newest = LogRecord::decode(records.next().transpose()?.unwrap_or_default())?;
        assert!(matches!(newest, LogRecord::Commit { .. }));
        let checkpoint = LogRecord::decode(records.next().transpose()?.unwrap_or_default())?;
        assert_eq!(checkpoint, LogRecord::Checkpoint);

        let mut tx = db.new_transaction()?;
        let block = BlockId::new("testfile", 0);
        tx.pin(&block)?;
        assert_eq!(tx.get_int(&block, 0)?, 11);
        tx.commit()?;
        Ok(())
    }

    #[test]
    fn test_store_block_size_must_match() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(FileManager::new(dir.path(), 256)?);
        let result = Database::with_store(test_config(dir.path()), store);
        assert!(matches!(result, Err(DbError::Config(_))));
        Ok(())
    }
}
