//! Disk Hash Table Module
//!
//! Chained hash table whose buckets, keys and values all live in
//! memory-mapped files.
//!
//! ## Responsibilities
//! - Bucket index: a [`FixedArray<u64>`](crate::array::FixedArray) of chain
//!   head offsets, one per bucket (0 = empty)
//! - Key log: append-only key records, each holding its value offset and an
//!   in-place rewritable link to the next record of its chain
//! - Value log: append-only length-prefixed values
//! - Control file: capacity and codec ids of kept stores, checked on reopen
//!
//! ## File Layout
//! ```text
//!   {data_dir}/{name}.hash     bucket index (u64 LE per bucket)
//!   {data_dir}/{name}.key      [1 unused byte][key record]*
//!   {data_dir}/{name}.value    [1 unused byte][value record]*
//!   {data_dir}/{name}.control  capacity / key codec id / value codec id
//! ```
//!
//! Removal only unlinks a record, so both logs grow monotonically until the
//! table is cleared.

mod control;
mod iter;
mod raw;
mod record;
mod table;

use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::mmap::ViewOptions;

pub use control::ControlFile;
pub use iter::{Iter, Keys, Values};
pub use raw::{LogSizing, RawTable, TableStats};
pub use table::DiskHashTable;

/// Paths of the four files making up a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub hash: PathBuf,
    pub key: PathBuf,
    pub value: PathBuf,
    pub control: PathBuf,
}

impl StorePaths {
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            hash: dir.join(format!("{}.hash", name)),
            key: dir.join(format!("{}.key", name)),
            value: dir.join(format!("{}.value", name)),
            control: dir.join(format!("{}.control", name)),
        }
    }

    /// The three region files, in bucket/key/value order
    pub fn regions(&self) -> [&Path; 3] {
        [&self.hash, &self.key, &self.value]
    }

    /// First region file that does not exist
    pub(crate) fn missing_region(&self) -> Option<PathBuf> {
        self.regions()
            .into_iter()
            .find(|p| !p.is_file())
            .map(Path::to_path_buf)
    }
}

/// Smallest prime >= `n` (2 for anything below 2)
pub fn next_prime(n: u64) -> u64 {
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

fn is_prime(n: u64) -> bool {
    if n < 4 {
        return n >= 2;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut i = 5u64;
    while i.saturating_mul(i) <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

/// Control data and chain statistics of a kept store
#[derive(Debug, Clone)]
pub struct StoreReport {
    pub name: String,
    pub control: ControlFile,
    pub stats: TableStats,
}

/// Open a kept store without knowing its key/value types and verify it
///
/// Nothing is written to a consistent store; a region file shorter than the
/// control file implies is extended with zeros.
pub fn inspect_store(dir: impl AsRef<Path>, name: &str) -> Result<StoreReport> {
    let paths = StorePaths::new(dir, name);
    if !paths.control.is_file() {
        return Err(StoreError::MissingFile(paths.control));
    }
    if let Some(missing) = paths.missing_region() {
        return Err(StoreError::MissingFile(missing));
    }

    let control = ControlFile::read(&paths.control)?;
    let table = RawTable::open_existing(
        &paths,
        control.capacity,
        LogSizing::default(),
        ViewOptions::default(),
    )?;

    let stats = table.verify();
    table.dispose(false)?;

    Ok(StoreReport {
        name: name.to_string(),
        control,
        stats: stats?,
    })
}
