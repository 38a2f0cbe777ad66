//! Global table of block locks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

use crate::storage::BlockId;

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
}

/// Readers/writer lock for one block. Waiters block on the condvar until the
/// lock is released or their deadline passes.
#[derive(Debug, Default)]
struct BlockLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl BlockLock {
    fn lock_shared(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while state.writer {
            if self.released.wait_until(&mut state, deadline).timed_out() {
                if state.writer {
                    return false;
                }
                break;
            }
        }
        state.readers += 1;
        true
    }

    fn lock_exclusive(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while state.writer || state.readers > 0 {
            if self.released.wait_until(&mut state, deadline).timed_out() {
                if state.writer || state.readers > 0 {
                    return false;
                }
                break;
            }
        }
        state.writer = true;
        true
    }

    fn unlock_shared(&self) {
        let mut state = self.state.lock();
        state.readers = state.readers.saturating_sub(1);
        if state.readers == 0 {
            self.released.notify_all();
        }
    }

    fn unlock_exclusive(&self) {
        let mut state = self.state.lock();
        state.writer = false;
        self.released.notify_all();
    }
}

/// Lock table shared by all transactions of a database.
///
/// The table has no notion of ownership. Callers are responsible for
/// releasing only what they acquired; [`LockManager`](super::LockManager)
/// does that bookkeeping per transaction.
#[derive(Debug)]
pub struct LockTable {
    locks: DashMap<BlockId, Arc<BlockLock>>,
    timeout: Duration,
}

impl LockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquires a shared lock, waiting at most the table timeout.
    /// Returns false if the lock could not be granted in time.
    pub fn lock_shared(&self, block: &BlockId) -> bool {
        let deadline = Instant::now() + self.timeout;
        self.entry(block).lock_shared(deadline)
    }

    /// Acquires an exclusive lock, waiting at most the table timeout.
    pub fn lock_exclusive(&self, block: &BlockId) -> bool {
        let deadline = Instant::now() + self.timeout;
        self.entry(block).lock_exclusive(deadline)
    }

    pub fn unlock_shared(&self, block: &BlockId) {
        if let Some(lock) = self.get(block) {
            lock.unlock_shared();
        }
    }

    pub fn unlock_exclusive(&self, block: &BlockId) {
        if let Some(lock) = self.get(block) {
            lock.unlock_exclusive();
        }
    }

    fn entry(&self, block: &BlockId) -> Arc<BlockLock> {
        // Clone the Arc out so the shard guard is not held while waiting.
        Arc::clone(self.locks.entry(block.clone()).or_default().value())
    }

    fn get(&self, block: &BlockId) -> Option<Arc<BlockLock>> {
        self.locks.get(block).map(|lock| Arc::clone(lock.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn block(n: u32) -> BlockId {
        BlockId::new("testfile", n)
    }

    #[test]
    fn test_shared_locks_are_compatible() {
        let table = LockTable::new(TIMEOUT);
        assert!(table.lock_shared(&block(1)));
        assert!(table.lock_shared(&block(1)));
        assert!(!table.lock_exclusive(&block(1)));

        table.unlock_shared(&block(1));
        assert!(!table.lock_exclusive(&block(1)));
        table.unlock_shared(&block(1));
        assert!(table.lock_exclusive(&block(1)));
    }

    #[test]
    fn test_exclusive_blocks_everyone() {
        let table = LockTable::new(TIMEOUT);
        assert!(table.lock_exclusive(&block(1)));

        let start = Instant::now();
        assert!(!table.lock_shared(&block(1)));
        assert!(start.elapsed() >= TIMEOUT);
        assert!(!table.lock_exclusive(&block(1)));

        // Other blocks are unaffected.
        assert!(table.lock_exclusive(&block(2)));
    }

    #[test]
    fn test_waiter_granted_after_release() {
        let table = Arc::new(LockTable::new(Duration::from_secs(5)));
        let barrier = Arc::new(Barrier::new(2));
        assert!(table.lock_exclusive(&block(1)));

        let waiter = {
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                table.lock_shared(&block(1))
            })
        };
        barrier.wait();
        thread::sleep(Duration::from_millis(50));
        table.unlock_exclusive(&block(1));

        assert!(waiter.join().expect("waiter panicked"));
    }

    #[test]
    fn test_unlock_of_unknown_block_is_noop() {
        let table = LockTable::new(TIMEOUT);
        table.unlock_shared(&block(9));
        table.unlock_exclusive(&block(9));
        assert!(table.lock_exclusive(&block(9)));
    }
}
