use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use parking_lot::Mutex;

use super::BlockStore;
use crate::error::DbResult;
use crate::storage::{BlockId, Page};

/// Prefix of scratch files removed when the database starts.
const TEMP_FILE_PREFIX: &str = "temp";

/// File-backed block store rooted at a database directory.
pub struct FileManager {
    db_dir: PathBuf,
    block_size: usize,
    is_new: bool,
    open_files: Mutex<HashMap<String, File>>,
}

impl FileManager {
    /// Opens the database directory, creating it when missing.
    pub fn new(db_dir: &Path, block_size: usize) -> DbResult<Self> {
        let is_new = !db_dir.is_dir();
        if is_new {
            fs::create_dir_all(db_dir)?;
            info!("Created database directory {:?}", db_dir);
        }

        for entry in fs::read_dir(db_dir)? {
            let entry = entry?;
            if entry
                .file_name()
                .to_string_lossy()
                .starts_with(TEMP_FILE_PREFIX)
            {
                if let Err(e) = fs::remove_file(entry.path()) {
                    warn!("Could not delete temporary file {:?}: {}", entry.path(), e);
                }
            }
        }

        Ok(Self {
            db_dir: db_dir.to_path_buf(),
            block_size,
            is_new,
            open_files: Mutex::new(HashMap::new()),
        })
    }

    /// True when the directory did not exist before this manager was created.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    fn with_file<T>(
        &self,
        file_name: &str,
        f: impl FnOnce(&mut File) -> std::io::Result<T>,
    ) -> DbResult<T> {
        let mut files = self.open_files.lock();
        let file = match files.entry(file_name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(self.db_dir.join(file_name))?,
            ),
        };
        Ok(f(file)?)
    }

    fn block_offset(&self, block: &BlockId) -> u64 {
        block.number() as u64 * self.block_size as u64
    }
}

impl BlockStore for FileManager {
    fn read(&self, block: &BlockId, page: &mut Page) -> DbResult<()> {
        let offset = self.block_offset(block);
        self.with_file(block.file_name(), |file| {
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(page.contents_mut())
        })
    }

    fn write(&self, block: &BlockId, page: &Page) -> DbResult<()> {
        let offset = self.block_offset(block);
        self.with_file(block.file_name(), |file| {
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(page.contents())?;
            file.sync_all()
        })
    }

    fn append(&self, file_name: &str) -> DbResult<BlockId> {
        let block_size = self.block_size as u64;
        let number = self.with_file(file_name, |file| {
            let end = file.seek(SeekFrom::End(0))?;
            let number = (end / block_size) as u32;
            file.seek(SeekFrom::Start(number as u64 * block_size))?;
            file.write_all(&vec![0u8; block_size as usize])?;
            file.sync_all()?;
            Ok(number)
        })?;
        debug!("Appended block {} to {}", number, file_name);
        Ok(BlockId::new(file_name, number))
    }

    fn length(&self, file_name: &str) -> DbResult<u32> {
        let len = self.with_file(file_name, |file| Ok(file.metadata()?.len()))?;
        Ok((len / self.block_size as u64) as u32)
    }

    fn block_size(&self) -> usize {
        self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use anyhow::Result;
    use tempfile::tempdir;

    const BLOCK_SIZE: usize = 128;

    #[test]
    fn test_new_and_existing_directory() -> Result<()> {
        let dir = tempdir()?;
        let db_dir = dir.path().join("db");

        {
            let fm = FileManager::new(&db_dir, BLOCK_SIZE)?;
            assert!(fm.is_new());
            assert_eq!(fm.block_size(), BLOCK_SIZE);
        }

        let fm = FileManager::new(&db_dir, BLOCK_SIZE)?;
        assert!(!fm.is_new());
        assert_eq!(fm.db_dir(), db_dir.as_path());
        Ok(())
    }

    #[test]
    fn test_removes_temp_files() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("temp_sort_1"), b"scratch")?;
        fs::write(dir.path().join("students"), b"keep")?;

        FileManager::new(dir.path(), BLOCK_SIZE)?;

        assert!(!dir.path().join("temp_sort_1").exists());
        assert!(dir.path().join("students").exists());
        Ok(())
    }

    #[test]
    fn test_append_and_length() -> Result<()> {
        let dir = tempdir()?;
        let fm = FileManager::new(dir.path(), BLOCK_SIZE)?;

        assert_eq!(fm.length("data")?, 0);
        assert_eq!(fm.append("data")?, BlockId::new("data", 0));
        assert_eq!(fm.append("data")?, BlockId::new("data", 1));
        assert_eq!(fm.length("data")?, 2);
        assert_eq!(fm.length("other")?, 0);
        Ok(())
    }

    #[test]
    fn test_write_and_read_block() -> Result<()> {
        let dir = tempdir()?;
        let fm = FileManager::new(dir.path(), BLOCK_SIZE)?;
        let block = fm.append("data")?;
        fm.append("data")?;

        let mut page = Page::new(BLOCK_SIZE);
        page.set_string(88, "abcdefghijklm")?;
        page.set_int(88 + Page::max_length(13), 345)?;
        fm.write(&block, &page)?;

        let mut read = Page::new(BLOCK_SIZE);
        fm.read(&block, &mut read)?;
        assert_eq!(read.get_string(88)?, "abcdefghijklm");
        assert_eq!(read.get_int(88 + Page::max_length(13))?, 345);

        // Neighbouring block is untouched.
        fm.read(&BlockId::new("data", 1), &mut read)?;
        assert!(read.contents().iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn test_read_past_end_fails() -> Result<()> {
        let dir = tempdir()?;
        let fm = FileManager::new(dir.path(), BLOCK_SIZE)?;
        fm.append("data")?;

        let mut page = Page::new(BLOCK_SIZE);
        assert!(matches!(
            fm.read(&BlockId::new("data", 5), &mut page),
            Err(DbError::Io(_))
        ));
        Ok(())
    }

    #[test]
    fn test_persistence_across_managers() -> Result<()> {
        let dir = tempdir()?;
        {
            let fm = FileManager::new(dir.path(), BLOCK_SIZE)?;
            let block = fm.append("data")?;
            let mut page = Page::new(BLOCK_SIZE);
            page.set_int(0, 99)?;
            fm.write(&block, &page)?;
        }

        let fm = FileManager::new(dir.path(), BLOCK_SIZE)?;
        assert_eq!(fm.length("data")?, 1);
        let mut page = Page::new(BLOCK_SIZE);
        fm.read(&BlockId::new("data", 0), &mut page)?;
        assert_eq!(page.get_int(0)?, 99);
        Ok(())
    }
}
