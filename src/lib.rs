//! blockdb: the storage and transaction core of a small relational engine.
//!
//! Data lives in fixed-size blocks. Transactions pin blocks into a shared
//! buffer pool, lock them with strict two-phase locking and log every
//! update's old value, so unfinished work can be undone after a crash.

pub mod concurrency;
pub mod config;
pub mod database;
pub mod error;
pub mod recovery;
pub mod storage;
pub mod transaction;

pub use config::DbConfig;
pub use database::Database;
pub use error::{DbError, DbResult};
pub use transaction::Transaction;
