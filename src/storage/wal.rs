//! Write-Ahead Logging (WAL) module.
//!
//! The log is a file of fixed-size blocks. Each block starts with a 4-byte
//! boundary: the offset of the most recently written record in that block.
//! Records are packed right to left as `[4-byte length][payload]`, so reading
//! a block from its boundary to its end yields the newest record first.

pub mod iterator;
pub mod manager;

use std::fmt;

use crate::error::{DbError, DbResult};
use crate::storage::Page;

pub use iterator::LogIterator;
pub use manager::LogManager;

/// Log Sequence Number: the append position of a log record.
/// The first record ever appended by a log manager gets `Lsn(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Lsn(pub u64);

impl Lsn {
    pub fn next(&self) -> Self {
        Lsn(self.0 + 1)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LSN({})", self.0)
    }
}

/// Size of the boundary header and of each record's length prefix.
const INT_SIZE: usize = 4;

/// Reads and validates the boundary header of a log block.
fn read_boundary(page: &Page) -> DbResult<usize> {
    let boundary = page.get_int(0)?;
    usize::try_from(boundary)
        .ok()
        .filter(|&b| b >= INT_SIZE && b <= page.size())
        .ok_or_else(|| DbError::MalformedLogRecord(format!("log block boundary {boundary}")))
}
