use std::collections::HashMap;
use std::sync::Arc;

use super::replacer::Replacer;
use super::Buffer;

/// Picks the unpinned buffer that was released longest ago. Buffers that
/// were never unpinned (still empty) go first.
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Logical time of each buffer's last unpin.
    last_unpinned: HashMap<usize, u64>,
    clock: u64,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Replacer for LruReplacer {
    fn victim(&mut self, buffers: &[Arc<Buffer>]) -> Option<usize> {
        buffers
            .iter()
            .filter(|buffer| !buffer.is_pinned())
            .map(|buffer| buffer.index())
            .min_by_key(|index| self.last_unpinned.get(index).copied().unwrap_or(0))
    }

    fn unpinned(&mut self, index: usize) {
        self.clock += 1;
        self.last_unpinned.insert(index, self.clock);
    }
}
