//! Database configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};
use crate::storage::{LruReplacer, NaiveReplacer, Replacer};

/// Smallest block that still holds a log block header and a useful record.
pub const MIN_BLOCK_SIZE: usize = 64;

/// Buffer replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementPolicy {
    /// First unpinned buffer in pool order.
    #[default]
    Naive,
    /// Least recently unpinned buffer.
    Lru,
}

impl ReplacementPolicy {
    pub fn build(self) -> Box<dyn Replacer> {
        match self {
            ReplacementPolicy::Naive => Box::new(NaiveReplacer),
            ReplacementPolicy::Lru => Box::new(LruReplacer::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Directory holding the data files and the log.
    pub data_dir: PathBuf,
    pub block_size: usize,
    /// Number of buffers in the pool.
    pub buffer_count: usize,
    pub log_file: String,
    /// How long a pin waits for a free buffer.
    pub pin_timeout_ms: u64,
    /// How long a lock request waits before giving up.
    pub lock_timeout_ms: u64,
    pub replacement: ReplacementPolicy,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("blockdb_data"),
            block_size: 400,
            buffer_count: 8,
            log_file: "blockdb.log".to_string(),
            pin_timeout_ms: 3000,
            lock_timeout_ms: 5000,
            replacement: ReplacementPolicy::Naive,
        }
    }
}

impl DbConfig {
    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> DbResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: DbConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(DbError::Config(format!(
                "block_size must be at least {}, got {}",
                MIN_BLOCK_SIZE, self.block_size
            )));
        }
        if self.buffer_count == 0 {
            return Err(DbError::Config("buffer_count must be at least 1".to_string()));
        }
        if self.log_file.is_empty() {
            return Err(DbError::Config("log_file must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn pin_timeout(&self) -> Duration {
        Duration::from_millis(self.pin_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
