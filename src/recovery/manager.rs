use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use super::LogRecord;
use crate::error::{DbError, DbResult};
use crate::storage::{Buffer, BufferPool, LogManager, Lsn};
use crate::transaction::{Transaction, TransactionId};

/// Summary of a recovery pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStats {
    pub records_scanned: usize,
    pub records_undone: usize,
    pub transactions_undone: usize,
}

impl fmt::Display for RecoveryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned {} records, undid {} updates from {} transactions",
            self.records_scanned, self.records_undone, self.transactions_undone
        )
    }
}

/// Writes the log records of one transaction and drives its rollback.
///
/// Cloning is cheap; the transaction keeps one and hands a clone to the
/// undo passes, which need the transaction itself mutably.
#[derive(Clone)]
pub struct RecoveryManager {
    tx: TransactionId,
    log: Arc<LogManager>,
    pool: Arc<BufferPool>,
}

impl RecoveryManager {
    /// Appends a Start record for `tx`.
    pub fn new(tx: TransactionId, log: Arc<LogManager>, pool: Arc<BufferPool>) -> DbResult<Self> {
        LogRecord::Start { tx }.append_to(&log)?;
        Ok(Self { tx, log, pool })
    }

    /// Logs the change of the int at `offset` to `new`. Must be called
    /// before the page is modified, since the current value is logged as
    /// the old one.
    pub fn set_int(&self, buffer: &Buffer, offset: usize, new: i32) -> DbResult<Lsn> {
        let old = buffer.contents().get_int(offset)?;
        let block = buffer.block().ok_or(DbError::UnassignedBuffer)?;
        LogRecord::SetInt {
            tx: self.tx,
            block,
            offset,
            old,
            new,
        }
        .append_to(&self.log)
    }

    /// String counterpart of [`set_int`](Self::set_int).
    pub fn set_string(&self, buffer: &Buffer, offset: usize, new: &str) -> DbResult<Lsn> {
        // Whatever bytes were there, even if they never held a string.
        let old = buffer.contents().get_bytes(offset)?.to_vec();
        let block = buffer.block().ok_or(DbError::UnassignedBuffer)?;
        LogRecord::SetString {
            tx: self.tx,
            block,
            offset,
            old,
            new: new.to_string(),
        }
        .append_to(&self.log)
    }

    /// Forces the transaction's buffers to disk, then writes and flushes the
    /// Commit record.
    pub fn commit(&self) -> DbResult<()> {
        self.pool.flush_all(self.tx)?;
        let lsn = LogRecord::Commit { tx: self.tx }.append_to(&self.log)?;
        self.log.flush(lsn)?;
        info!("{} committed", self.tx);
        Ok(())
    }

    /// Undoes the transaction's updates, newest first, back to its Start
    /// record. `tx` must be the transaction this manager belongs to.
    pub fn rollback(&self, tx: &mut Transaction) -> DbResult<()> {
        let mut undone = 0;
        for bytes in self.log.iterator()? {
            let record = LogRecord::decode(bytes?)?;
            if record.tx_id() != Some(self.tx) {
                continue;
            }
            if let LogRecord::Start { .. } = record {
                break;
            }
            debug!("Undoing {}", record);
            record.undo(tx)?;
            undone += 1;
        }

        self.pool.flush_all(self.tx)?;
        let lsn = LogRecord::Rollback { tx: self.tx }.append_to(&self.log)?;
        self.log.flush(lsn)?;
        info!("{} rolled back, {} updates undone", self.tx, undone);
        Ok(())
    }

    /// Undoes every update of transactions that neither committed nor rolled
    /// back, scanning back to the last checkpoint. Writes a new checkpoint
    /// when done. Must run before other transactions start.
    pub fn recover(&self, tx: &mut Transaction) -> DbResult<RecoveryStats> {
        let mut stats = RecoveryStats::default();
        let mut finished = HashSet::new();
        let mut undone = HashSet::new();

        for bytes in self.log.iterator()? {
            let record = LogRecord::decode(bytes?)?;
            stats.records_scanned += 1;
            match &record {
                LogRecord::Checkpoint => break,
                LogRecord::Commit { tx: done } | LogRecord::Rollback { tx: done } => {
                    finished.insert(*done);
                }
                LogRecord::SetInt { tx: owner, .. } | LogRecord::SetString { tx: owner, .. }
                    if !finished.contains(owner) =>
                {
                    debug!("Undoing {}", record);
                    record.undo(tx)?;
                    stats.records_undone += 1;
                    undone.insert(*owner);
                }
                _ => {}
            }
        }
        stats.transactions_undone = undone.len();

        self.pool.flush_all(self.tx)?;
        let lsn = LogRecord::Checkpoint.append_to(&self.log)?;
        self.log.flush(lsn)?;
        info!("Recovery complete: {}", stats);
        Ok(stats)
    }
}
