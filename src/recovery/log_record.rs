//! Log record types and their binary layout.
//!
//! Every record starts with a 4-byte operation tag. Update records carry the
//! old value of the change so it can be undone; there is no redo.

use std::fmt;

use crate::error::{DbError, DbResult};
use crate::storage::{BlockId, LogManager, Lsn, Page};
use crate::transaction::{Transaction, TransactionId};

const INT_SIZE: usize = 4;

/// Operation tags as written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LogOp {
    Checkpoint = 0,
    Start = 1,
    Commit = 2,
    Rollback = 3,
    SetInt = 4,
    SetString = 5,
}

impl TryFrom<i32> for LogOp {
    type Error = DbError;

    fn try_from(tag: i32) -> DbResult<Self> {
        Ok(match tag {
            0 => LogOp::Checkpoint,
            1 => LogOp::Start,
            2 => LogOp::Commit,
            3 => LogOp::Rollback,
            4 => LogOp::SetInt,
            5 => LogOp::SetString,
            other => return Err(DbError::UnknownLogTag(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Checkpoint,
    Start {
        tx: TransactionId,
    },
    Commit {
        tx: TransactionId,
    },
    Rollback {
        tx: TransactionId,
    },
    SetInt {
        tx: TransactionId,
        block: BlockId,
        offset: usize,
        old: i32,
        new: i32,
    },
    SetString {
        tx: TransactionId,
        block: BlockId,
        offset: usize,
        /// Raw bytes previously stored at `offset`; they need not be UTF-8.
        old: Vec<u8>,
        new: String,
    },
}

impl LogRecord {
    pub fn op(&self) -> LogOp {
        match self {
            LogRecord::Checkpoint => LogOp::Checkpoint,
            LogRecord::Start { .. } => LogOp::Start,
            LogRecord::Commit { .. } => LogOp::Commit,
            LogRecord::Rollback { .. } => LogOp::Rollback,
            LogRecord::SetInt { .. } => LogOp::SetInt,
            LogRecord::SetString { .. } => LogOp::SetString,
        }
    }

    /// The transaction that wrote the record. Checkpoints belong to none.
    pub fn tx_id(&self) -> Option<TransactionId> {
        match self {
            LogRecord::Checkpoint => None,
            LogRecord::Start { tx }
            | LogRecord::Commit { tx }
            | LogRecord::Rollback { tx }
            | LogRecord::SetInt { tx, .. }
            | LogRecord::SetString { tx, .. } => Some(*tx),
        }
    }

    pub fn encode(&self) -> DbResult<Vec<u8>> {
        let mut writer = RecordWriter::new(self.encoded_len());
        writer.int(self.op() as i32)?;
        match self {
            LogRecord::Checkpoint => {}
            LogRecord::Start { tx } | LogRecord::Commit { tx } | LogRecord::Rollback { tx } => {
                writer.int(tx.value() as i32)?;
            }
            LogRecord::SetInt {
                tx,
                block,
                offset,
                old,
                new,
            } => {
                writer.update_header(*tx, block, *offset)?;
                writer.int(*old)?;
                writer.int(*new)?;
            }
            LogRecord::SetString {
                tx,
                block,
                offset,
                old,
                new,
            } => {
                writer.update_header(*tx, block, *offset)?;
                writer.bytes(old)?;
                writer.string(new)?;
            }
        }
        Ok(writer.finish())
    }

    pub fn decode(bytes: Vec<u8>) -> DbResult<Self> {
        let mut reader = RecordReader::new(bytes);
        let op = LogOp::try_from(reader.int()?)?;
        let record = match op {
            LogOp::Checkpoint => LogRecord::Checkpoint,
            LogOp::Start => LogRecord::Start { tx: reader.tx()? },
            LogOp::Commit => LogRecord::Commit { tx: reader.tx()? },
            LogOp::Rollback => LogRecord::Rollback { tx: reader.tx()? },
            LogOp::SetInt => {
                let (tx, block, offset) = reader.update_header()?;
                LogRecord::SetInt {
                    tx,
                    block,
                    offset,
                    old: reader.int()?,
                    new: reader.int()?,
                }
            }
            LogOp::SetString => {
                let (tx, block, offset) = reader.update_header()?;
                LogRecord::SetString {
                    tx,
                    block,
                    offset,
                    old: reader.bytes()?,
                    new: reader.string()?,
                }
            }
        };
        Ok(record)
    }

    /// Encodes the record and appends it to the log.
    pub fn append_to(&self, log: &LogManager) -> DbResult<Lsn> {
        log.append(&self.encode()?)
    }

    /// Restores the old value of an update record through `tx`, without
    /// logging the restore. Control records have nothing to undo.
    pub fn undo(&self, tx: &mut Transaction) -> DbResult<()> {
        match self {
            LogRecord::SetInt {
                block, offset, old, ..
            } => {
                tx.pin(block)?;
                let result = tx.set_int(block, *offset, *old, false);
                tx.unpin(block)?;
                result
            }
            LogRecord::SetString {
                block, offset, old, ..
            } => {
                tx.pin(block)?;
                let result = tx.restore_bytes(block, *offset, old);
                tx.unpin(block)?;
                result
            }
            _ => Ok(()),
        }
    }

    fn encoded_len(&self) -> usize {
        // tag, tx, file name, block number, offset
        let update_header =
            |block: &BlockId| 4 * INT_SIZE + Page::max_length(block.file_name().len());
        match self {
            LogRecord::Checkpoint => INT_SIZE,
            LogRecord::Start { .. } | LogRecord::Commit { .. } | LogRecord::Rollback { .. } => {
                2 * INT_SIZE
            }
            LogRecord::SetInt { block, .. } => update_header(block) + 2 * INT_SIZE,
            LogRecord::SetString {
                block, old, new, ..
            } => {
                update_header(block) + Page::max_length(old.len()) + Page::max_length(new.len())
            }
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Checkpoint => write!(f, "<CHECKPOINT>"),
            LogRecord::Start { tx } => write!(f, "<START {}>", tx),
            LogRecord::Commit { tx } => write!(f, "<COMMIT {}>", tx),
            LogRecord::Rollback { tx } => write!(f, "<ROLLBACK {}>", tx),
            LogRecord::SetInt {
                tx,
                block,
                offset,
                old,
                new,
            } => write!(f, "<SETINT {} {} {} {} -> {}>", tx, block, offset, old, new),
            LogRecord::SetString {
                tx,
                block,
                offset,
                old,
                new,
            } => write!(
                f,
                "<SETSTRING {} {} {} {:?} -> {:?}>",
                tx,
                block,
                offset,
                String::from_utf8_lossy(old),
                new
            ),
        }
    }
}

struct RecordWriter {
    page: Page,
    pos: usize,
}

impl RecordWriter {
    fn new(len: usize) -> Self {
        Self {
            page: Page::new(len),
            pos: 0,
        }
    }

    fn int(&mut self, value: i32) -> DbResult<()> {
        self.page.set_int(self.pos, value)?;
        self.pos += INT_SIZE;
        Ok(())
    }

    fn bytes(&mut self, value: &[u8]) -> DbResult<()> {
        self.page.set_bytes(self.pos, value)?;
        self.pos += Page::max_length(value.len());
        Ok(())
    }

    fn string(&mut self, value: &str) -> DbResult<()> {
        self.bytes(value.as_bytes())
    }

    /// Writes `[tx][file name][block][offset]`.
    fn update_header(&mut self, tx: TransactionId, block: &BlockId, offset: usize) -> DbResult<()> {
        self.int(tx.value() as i32)?;
        self.string(block.file_name())?;
        self.int(block.number() as i32)?;
        self.int(offset as i32)
    }

    fn finish(self) -> Vec<u8> {
        self.page.into_bytes()
    }
}

struct RecordReader {
    page: Page,
    pos: usize,
}

impl RecordReader {
    fn new(bytes: Vec<u8>) -> Self {
        Self {
            page: Page::from_bytes(bytes),
            pos: 0,
        }
    }

    fn int(&mut self) -> DbResult<i32> {
        let value = self.page.get_int(self.pos).map_err(|e| self.truncated(e))?;
        self.pos += INT_SIZE;
        Ok(value)
    }

    fn bytes(&mut self) -> DbResult<Vec<u8>> {
        let value = self
            .page
            .get_bytes(self.pos)
            .map(<[u8]>::to_vec)
            .map_err(|e| self.truncated(e))?;
        self.pos += Page::max_length(value.len());
        Ok(value)
    }

    fn string(&mut self) -> DbResult<String> {
        let offset = self.pos;
        String::from_utf8(self.bytes()?).map_err(|_| {
            DbError::MalformedLogRecord(format!("invalid UTF-8 string at byte {}", offset))
        })
    }

    fn tx(&mut self) -> DbResult<TransactionId> {
        Ok(TransactionId::new(self.int()? as u32))
    }

    fn update_header(&mut self) -> DbResult<(TransactionId, BlockId, usize)> {
        let tx = self.tx()?;
        let file_name = self.string()?;
        let number = self.int()? as u32;
        let offset = self.int()?;
        let offset = usize::try_from(offset)
            .map_err(|_| DbError::MalformedLogRecord(format!("negative offset {}", offset)))?;
        Ok((tx, BlockId::new(file_name, number), offset))
    }

    fn truncated(&self, err: DbError) -> DbError {
        DbError::MalformedLogRecord(format!(
            "{}-byte record truncated at byte {}: {}",
            self.page.size(),
            self.pos,
            err
        ))
    }
}
