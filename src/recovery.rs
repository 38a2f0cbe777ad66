//! Undo-only recovery.
//!
//! Every change is logged with its old value before the page is modified,
//! and a transaction's buffers are forced to disk before its Commit record
//! is written. Committed work is therefore always on disk, and recovery only
//! has to undo the changes of transactions that never finished.

pub mod log_record;
pub mod manager;

pub use log_record::{LogOp, LogRecord};
pub use manager::{RecoveryManager, RecoveryStats};
