#[cfg(test)]
mod tests;

pub mod pretty;

use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;

/// Zero-based index of a page within a page file.
/// Examples:
/// - `let header_page: PageNum = 0;`
/// - `let first_directory_page: PageNum = 1;`
/// - `let data_page: PageNum = 42;`
pub type PageNum = u32;

/// Fully-qualified identifier for a record: the data page holding it and
/// the index of its first slot on that page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rid {
    pub page: PageNum,
    pub slot: u32,
}

impl Rid {
    pub fn new(page: PageNum, slot: u32) -> Self {
        Self { page, slot }
    }
}

/// A tuple as the record manager stores it: the packed attribute bytes,
/// plus the RID once the record has been placed in (or read from) a table.
///
/// The byte layout follows schema order, each attribute at its fixed width;
/// `catalog::Schema` owns the encoding and decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub id: Option<Rid>,
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(data: Vec<u8>) -> Self {
        Self { id: None, data }
    }

    /// A zero-filled record body of the given size.
    pub fn zeroed(record_size: usize) -> Self {
        Self::new(vec![0u8; record_size])
    }

    pub fn with_rid(mut self, rid: Rid) -> Self {
        self.id = Some(rid);
        self
    }
}

/// Canonical error type shared across the engine's subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("page file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("read of non-existing page {page} (file has {total} pages)")]
    ReadNonExistingPage { page: PageNum, total: u32 },
    #[error("write to page {page} failed: file has {total} pages")]
    WriteFailed { page: PageNum, total: u32 },
    #[error("no evictable frame: every page in the pool is pinned")]
    NoVictim,
    #[error("cannot shut down buffer pool: {0} page(s) still pinned")]
    PinnedPagesRemain(usize),
    #[error("replacement strategy {0} is not implemented")]
    UnsupportedStrategy(String),
    #[error("unknown data type: {0}")]
    UnknownDataType(String),
    #[error("record {0:?} does not exist")]
    RecordNotFound(Rid),
    #[error("corrupted table file: {0}")]
    Corrupted(String),
    #[error("schema: {0}")]
    Schema(String),
    #[error("expr: {0}")]
    Expr(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for opening a table.
///
/// # Example
/// ```
/// use common::Config;
///
/// let config = Config::builder().buffer_frames(32).build();
/// assert_eq!(config.buffer_frames, 32);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Number of frames the table's buffer pool keeps resident.
    #[builder(default = 10)]
    pub buffer_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { buffer_frames: 10 }
    }
}
