use std::fmt::Debug;
use std::sync::Arc;

use super::Buffer;

/// Chooses which unpinned buffer gets reassigned to a new block.
///
/// Called with the pool lock held, so implementations see a stable set of
/// pin counts.
pub trait Replacer: Send + Debug {
    /// Select a buffer to reassign. Returns None if every buffer is pinned.
    fn victim(&mut self, buffers: &[Arc<Buffer>]) -> Option<usize>;

    /// The buffer at `index` has just become unpinned.
    fn unpinned(&mut self, index: usize);
}

/// Picks the first unpinned buffer in pool order.
#[derive(Debug, Default)]
pub struct NaiveReplacer;

impl Replacer for NaiveReplacer {
    fn victim(&mut self, buffers: &[Arc<Buffer>]) -> Option<usize> {
        buffers.iter().position(|buffer| !buffer.is_pinned())
    }

    fn unpinned(&mut self, _index: usize) {}
}
