//! Concurrency control.
//!
//! Block-level shared/exclusive locks following strict two-phase locking.
//! The [`LockTable`] is shared by every transaction of a database; each
//! transaction owns a [`LockManager`] that remembers what it holds.

use std::fmt;

pub mod lock;
pub mod lock_table;

pub use lock::LockManager;
pub use lock_table::LockTable;

/// Lock modes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock for reads.
    Shared,
    /// Exclusive lock for writes.
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "shared"),
            LockMode::Exclusive => write!(f, "exclusive"),
        }
    }
}
