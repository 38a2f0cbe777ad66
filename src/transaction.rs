//! Transactions.
//!
//! A [`Transaction`] coordinates the buffer pool, the lock table and the
//! log on behalf of one unit of work. Transactions are created by
//! [`Database::new_transaction`](crate::database::Database::new_transaction).

pub mod id;
pub mod manager;
pub mod pins;
pub mod state;

pub use id::{TransactionId, TransactionIdGenerator};
pub use manager::Transaction;
pub use pins::PinnedBuffers;
pub use state::TransactionState;
