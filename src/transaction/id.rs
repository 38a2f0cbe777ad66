//! Transaction ID generation.

use std::sync::atomic::{AtomicU32, Ordering};

/// A unique identifier for a transaction. Stored in log records as a
/// 4-byte integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u32);

impl TransactionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Txn{}", self.0)
    }
}

/// A thread-safe transaction ID generator.
#[derive(Debug)]
pub struct TransactionIdGenerator {
    next_id: AtomicU32,
}

impl TransactionIdGenerator {
    /// Creates a generator whose first ID is 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
        }
    }

    pub fn next(&self) -> TransactionId {
        TransactionId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the most recently issued ID, or 0 if none was issued.
    pub fn current(&self) -> TransactionId {
        let id = self.next_id.load(Ordering::SeqCst);
        TransactionId::new(id.saturating_sub(1))
    }
}

impl Default for TransactionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_transaction_id_display() {
        assert_eq!(TransactionId::new(123).to_string(), "Txn123");
    }

    #[test]
    fn test_generator_starts_at_one() {
        let generator = TransactionIdGenerator::new();
        assert_eq!(generator.current().value(), 0);
        assert_eq!(generator.next().value(), 1);
        assert_eq!(generator.next().value(), 2);
        assert_eq!(generator.current().value(), 2);
    }

    #[test]
    fn test_generator_thread_safety() {
        let generator = Arc::new(TransactionIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gen = Arc::clone(&generator);
                thread::spawn(move || (0..100).map(|_| gen.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all_ids: Vec<_> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .map(|id| id.value())
            .collect();
        all_ids.sort();
        all_ids.dedup();
        assert_eq!(all_ids.len(), 800);
    }
}
