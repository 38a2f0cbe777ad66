//! blockdb command line tool.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use blockdb::recovery::LogRecord;
use blockdb::storage::BlockId;
use blockdb::{Database, DbConfig, Transaction};

/// Inspect and modify a blockdb data directory
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short = 'D', long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Block size in bytes
    #[arg(long, global = true)]
    block_size: Option<usize>,

    /// Number of buffers in the pool
    #[arg(long, global = true)]
    buffers: Option<usize>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Location {
    /// File name inside the data directory
    #[arg(short, long)]
    file: String,

    /// Block number
    #[arg(short, long)]
    block: u32,

    /// Byte offset inside the block
    #[arg(short, long)]
    offset: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read an integer
    GetInt(Location),
    /// Write an integer
    SetInt {
        #[command(flatten)]
        at: Location,
        #[arg(short, long, allow_negative_numbers = true)]
        value: i32,
    },
    /// Read a string
    GetString(Location),
    /// Write a string
    SetString {
        #[command(flatten)]
        at: Location,
        #[arg(short, long)]
        value: String,
    },
    /// Append an empty block to a file
    Append {
        #[arg(short, long)]
        file: String,
    },
    /// Print the number of blocks in a file
    Size {
        #[arg(short, long)]
        file: String,
    },
    /// Print the log, newest record first
    Log,
    /// Run recovery and write a checkpoint
    Recover,
}

fn load_config(args: &Args) -> Result<DbConfig> {
    let mut config = match &args.config {
        Some(path) => DbConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DbConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(block_size) = args.block_size {
        config.block_size = block_size;
    }
    if let Some(buffers) = args.buffers {
        config.buffer_count = buffers;
    }
    config.validate()?;
    Ok(config)
}

/// Runs `f` in a new transaction, committing on success. On error the
/// transaction is dropped, which rolls it back.
fn in_transaction<T>(db: &Database, f: impl FnOnce(&mut Transaction) -> Result<T>) -> Result<T> {
    let mut tx = db.new_transaction()?;
    let result = f(&mut tx)?;
    tx.commit()?;
    Ok(result)
}

fn with_pinned<T>(
    db: &Database,
    at: &Location,
    f: impl FnOnce(&mut Transaction, &BlockId) -> Result<T>,
) -> Result<T> {
    let block = BlockId::new(at.file.as_str(), at.block);
    in_transaction(db, |tx| {
        tx.pin(&block)
            .with_context(|| format!("Failed to pin {}", block))?;
        f(tx, &block)
    })
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = load_config(&args)?;
    info!("Opening database in {}", config.data_dir.display());
    let db = Database::open(config).context("Failed to open database")?;

    match args.command {
        Command::GetInt(at) => {
            let value = with_pinned(&db, &at, |tx, block| Ok(tx.get_int(block, at.offset)?))?;
            println!("{}", value);
        }
        Command::SetInt { at, value } => {
            with_pinned(&db, &at, |tx, block| Ok(tx.set_int(block, at.offset, value, true)?))?;
        }
        Command::GetString(at) => {
            let value =
                with_pinned(&db, &at, |tx, block| Ok(tx.get_string(block, at.offset)?))?;
            println!("{}", value);
        }
        Command::SetString { at, value } => {
            with_pinned(&db, &at, |tx, block| {
                Ok(tx.set_string(block, at.offset, &value, true)?)
            })?;
        }
        Command::Append { file } => {
            let block = in_transaction(&db, |tx| Ok(tx.append(&file)?))?;
            println!("{}", block);
        }
        Command::Size { file } => {
            let size = in_transaction(&db, |tx| Ok(tx.size(&file)?))?;
            println!("{}", size);
        }
        Command::Log => {
            for bytes in db.log_manager().iterator()? {
                let record = LogRecord::decode(bytes?).context("Corrupt log record")?;
                println!("{}", record);
            }
        }
        Command::Recover => {
            let stats = db.recover()?;
            println!("{}", stats);
        }
    }

    Ok(())
}
