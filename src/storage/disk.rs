pub mod file_manager;

use crate::error::DbResult;
use crate::storage::{BlockId, Page};

pub use file_manager::FileManager;

/// Block-granular access to named files.
///
/// Every component above the disk holds an `Arc<dyn BlockStore>`, so a store
/// can be wrapped (for instance to observe write ordering) without touching
/// the buffer pool or the log.
pub trait BlockStore: Send + Sync {
    /// Reads the contents of `block` into `page`.
    fn read(&self, block: &BlockId, page: &mut Page) -> DbResult<()>;

    /// Writes `page` to `block` and syncs it to disk.
    fn write(&self, block: &BlockId, page: &Page) -> DbResult<()>;

    /// Appends a zero-filled block to `file_name` and returns its id.
    fn append(&self, file_name: &str) -> DbResult<BlockId>;

    /// Number of blocks in `file_name`.
    fn length(&self, file_name: &str) -> DbResult<u32>;

    fn block_size(&self) -> usize;
}
