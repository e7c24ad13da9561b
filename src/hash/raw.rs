//! Byte-level hash table engine
//!
//! Works on already-serialized keys and values and a precomputed bucket
//! index; the typed layer in `table.rs` supplies both.
//!
//! ## Invariants
//! - Records are only ever appended, so along any chain each link points to
//!   a strictly larger offset. A link that does not is a cycle.
//! - Every link is below the key-log append cursor; one that is not dangles.
//! - `count` equals the number of records reachable from the bucket heads.

use std::ops::Range;

use crate::array::FixedArray;
use crate::error::{Result, StoreError};
use crate::mmap::{ViewManager, ViewOptions};

use super::record::{write_next, KeyRecord, ValueRecord};
use super::StorePaths;

/// First usable offset in both logs; 0 means "no record"
pub(crate) const FIRST_OFFSET: u64 = 1;

/// Initial sizes of the two logs, also used when the table is cleared
#[derive(Debug, Clone, Copy)]
pub struct LogSizing {
    pub key_bytes: u64,
    pub value_bytes: u64,
}

impl Default for LogSizing {
    fn default() -> Self {
        Self {
            key_bytes: 64 * 1024,
            value_bytes: 64 * 1024,
        }
    }
}

/// Summary of a table's chains, produced by a full walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Number of buckets
    pub capacity: u64,
    /// Reachable key records
    pub count: u64,
    /// Buckets with a non-empty chain
    pub used_buckets: u64,
    /// Longest chain length
    pub longest_chain: u64,
    /// Append cursor of the key log
    pub key_log_bytes: u64,
    /// Append cursor of the value log
    pub value_log_bytes: u64,
}

/// Outcome of walking a chain looking for a key
enum Lookup {
    Found {
        record: KeyRecord,
        prev: Option<KeyRecord>,
    },
    Missing {
        tail: Option<KeyRecord>,
    },
}

/// Bucket index + key log + value log
pub struct RawTable {
    buckets: FixedArray<u64>,
    keys: ViewManager,
    values: ViewManager,
    capacity: u64,
    sizing: LogSizing,
    key_cursor: u64,
    value_cursor: u64,
    count: u64,
}

impl RawTable {
    /// Create fresh regions for `capacity` buckets
    pub(crate) fn create(
        paths: &StorePaths,
        capacity: u64,
        sizing: LogSizing,
        options: ViewOptions,
    ) -> Result<Self> {
        let buckets = FixedArray::open(&paths.hash, capacity, false, options)?;
        let keys = ViewManager::open(&paths.key, sizing.key_bytes, 1, options)?;
        let values = ViewManager::open(&paths.value, sizing.value_bytes, 1, options)?;

        Ok(Self {
            buckets,
            keys,
            values,
            capacity,
            sizing,
            key_cursor: FIRST_OFFSET,
            value_cursor: FIRST_OFFSET,
            count: 0,
        })
    }

    /// Open existing regions and recover count and cursors by walking every
    /// chain
    ///
    /// Records past the recovered cursors are unreachable, so appending over
    /// them is harmless.
    pub(crate) fn open_existing(
        paths: &StorePaths,
        capacity: u64,
        sizing: LogSizing,
        options: ViewOptions,
    ) -> Result<Self> {
        let buckets = FixedArray::open(&paths.hash, capacity, false, options)?;
        let keys = ViewManager::open(&paths.key, 1, 1, options)?;
        let values = ViewManager::open(&paths.value, 1, 1, options)?;

        let mut table = Self {
            key_cursor: keys.len_bytes(), // bound for link checks during recovery
            buckets,
            keys,
            values,
            capacity,
            sizing,
            value_cursor: FIRST_OFFSET,
            count: 0,
        };

        let mut key_end = FIRST_OFFSET;
        let mut value_end = FIRST_OFFSET;
        let mut count = 0;
        for record in table.records(0..capacity) {
            let record = record?;
            count += 1;
            key_end = key_end.max(record.end());
            let end = table
                .values
                .with_view(|view| ValueRecord::end(view, record.value_offset))?;
            value_end = value_end.max(end);
        }

        table.key_cursor = key_end;
        table.value_cursor = value_end;
        table.count = count;

        tracing::debug!(
            path = %paths.hash.display(),
            count,
            key_cursor = key_end,
            value_cursor = value_end,
            "recovered table state"
        );

        Ok(table)
    }

    // =========================================================================
    // Map Operations
    // =========================================================================

    /// Value bytes stored under `key`, if any
    pub fn get(&self, bucket: u64, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.locate(bucket, key)? {
            Lookup::Found { record, .. } => self.value_bytes(record.value_offset).map(Some),
            Lookup::Missing { .. } => Ok(None),
        }
    }

    pub fn contains(&self, bucket: u64, key: &[u8]) -> Result<bool> {
        Ok(matches!(self.locate(bucket, key)?, Lookup::Found { .. }))
    }

    /// Append a new entry and link it at the tail of its chain
    ///
    /// Fails with `DuplicateKey` if the chain already holds `key`.
    pub fn insert(&mut self, bucket: u64, key: &[u8], value: &[u8]) -> Result<()> {
        let tail = match self.locate(bucket, key)? {
            Lookup::Found { .. } => return Err(StoreError::DuplicateKey),
            Lookup::Missing { tail } => tail,
        };

        // Step 1: Append the value record
        let value_offset = self.value_cursor;
        ensure_room(&self.values, value_offset, ValueRecord::encoded_len(value.len() as u64))?;
        let value_end = self
            .values
            .with_view(|view| ValueRecord::append(view, value_offset, value))?;

        // Step 2: Append the key record pointing at it
        let key_offset = self.key_cursor;
        ensure_room(&self.keys, key_offset, KeyRecord::encoded_len(key.len() as u64))?;
        let key_end = self
            .keys
            .with_view(|view| KeyRecord::append(view, key_offset, key, value_offset))?;

        // Step 3: Link it as bucket head or after the current tail
        match tail {
            None => self.buckets.set(bucket, &key_offset)?,
            Some(tail) => self
                .keys
                .with_view(|view| write_next(view, tail.next_slot(), key_offset))?,
        }

        self.value_cursor = value_end;
        self.key_cursor = key_end;
        self.count += 1;
        Ok(())
    }

    /// Unlink the current record for `key` and append a new one
    ///
    /// Both logs are grown before anything is unlinked, so a failed growth
    /// leaves the old entry in place.
    pub fn replace(&mut self, bucket: u64, key: &[u8], value: &[u8]) -> Result<()> {
        self.reserve(key.len() as u64, value.len() as u64)?;
        self.remove(bucket, key)?;
        self.insert(bucket, key, value)
    }

    /// Unlink the record holding `key`; its bytes stay in the logs
    pub fn remove(&mut self, bucket: u64, key: &[u8]) -> Result<bool> {
        let (record, prev) = match self.locate(bucket, key)? {
            Lookup::Found { record, prev } => (record, prev),
            Lookup::Missing { .. } => return Ok(false),
        };

        match prev {
            None => self.buckets.set(bucket, &record.next)?,
            Some(prev) => self
                .keys
                .with_view(|view| write_next(view, prev.next_slot(), record.next))?,
        }

        self.count -= 1;
        Ok(true)
    }

    /// Zero the bucket index and reset both logs to their initial size
    pub fn clear(&mut self) -> Result<()> {
        self.buckets.reset(self.capacity)?;
        self.keys.reset(self.sizing.key_bytes)?;
        self.values.reset(self.sizing.value_bytes)?;

        self.key_cursor = FIRST_OFFSET;
        self.value_cursor = FIRST_OFFSET;
        self.count = 0;
        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Records of the given buckets, bucket by bucket, each chain in link order
    pub(crate) fn records(&self, buckets: Range<u64>) -> RecordIter<'_> {
        RecordIter {
            table: self,
            buckets,
            bucket: 0,
            prev: 0,
            next: 0,
            done: false,
        }
    }

    pub(crate) fn key_bytes(&self, record: &KeyRecord) -> Result<Vec<u8>> {
        self.keys.with_view(|view| Ok(record.key(view)?.to_vec()))
    }

    pub(crate) fn value_bytes(&self, offset: u64) -> Result<Vec<u8>> {
        self.values.with_view(|view| ValueRecord::read(view, offset))
    }

    /// Walk every chain, returning statistics
    pub fn stats(&self) -> Result<TableStats> {
        let mut stats = TableStats {
            capacity: self.capacity,
            key_log_bytes: self.key_cursor,
            value_log_bytes: self.value_cursor,
            ..TableStats::default()
        };

        for bucket in 0..self.capacity {
            let mut chain = 0;
            for record in self.records(bucket..bucket + 1) {
                record?;
                chain += 1;
            }
            if chain > 0 {
                stats.used_buckets += 1;
                stats.longest_chain = stats.longest_chain.max(chain);
            }
            stats.count += chain;
        }

        Ok(stats)
    }

    /// Walk every chain and check that the reachable records match `count`
    pub fn verify(&self) -> Result<TableStats> {
        let stats = self.stats()?;
        if stats.count != self.count {
            return Err(StoreError::Corruption(format!(
                "{} reachable records but count is {}",
                stats.count, self.count
            )));
        }
        Ok(stats)
    }

    // =========================================================================
    // Accessors / Lifecycle
    // =========================================================================

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn key_cursor(&self) -> u64 {
        self.key_cursor
    }

    pub fn value_cursor(&self) -> u64 {
        self.value_cursor
    }

    /// The three view managers, for reaper registration
    pub fn managers(&self) -> [&ViewManager; 3] {
        [self.buckets.manager(), &self.keys, &self.values]
    }

    pub fn flush(&self) -> Result<()> {
        self.buckets.flush()?;
        self.keys.flush()?;
        self.values.flush()
    }

    pub fn dispose(self, delete_files: bool) -> Result<()> {
        self.buckets.dispose(delete_files)?;
        self.keys.dispose(delete_files)?;
        self.values.dispose(delete_files)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Walk the chain of `bucket` comparing serialized keys byte for byte
    fn locate(&self, bucket: u64, key: &[u8]) -> Result<Lookup> {
        let head = self.buckets.get(bucket)?;
        let limit = self.key_cursor;

        self.keys.with_view(|view| {
            let mut prev: Option<KeyRecord> = None;
            let mut offset = head;

            while offset != 0 {
                check_link(bucket, prev.map_or(0, |p| p.offset), offset, limit)?;
                let record = KeyRecord::read(view, offset)?;
                if record.key(view)? == key {
                    return Ok(Lookup::Found { record, prev });
                }
                offset = record.next;
                prev = Some(record);
            }

            Ok(Lookup::Missing { tail: prev })
        })
    }

    /// Grow both logs so a record of the given sizes fits at the cursors
    fn reserve(&self, key_len: u64, value_len: u64) -> Result<()> {
        ensure_room(&self.values, self.value_cursor, ValueRecord::encoded_len(value_len))?;
        ensure_room(&self.keys, self.key_cursor, KeyRecord::encoded_len(key_len))
    }

    fn record_at(&self, bucket: u64, prev: u64, offset: u64) -> Result<KeyRecord> {
        check_link(bucket, prev, offset, self.key_cursor)?;
        self.keys.with_view(|view| KeyRecord::read(view, offset))
    }

    #[cfg(test)]
    pub(crate) fn keys_manager(&self) -> &ViewManager {
        &self.keys
    }
}

impl std::fmt::Debug for RawTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawTable")
            .field("capacity", &self.capacity)
            .field("count", &self.count)
            .field("key_cursor", &self.key_cursor)
            .field("value_cursor", &self.value_cursor)
            .finish()
    }
}

/// Links must move strictly forward and stay below the append cursor
fn check_link(bucket: u64, prev: u64, offset: u64, limit: u64) -> Result<()> {
    if offset <= prev || offset >= limit {
        return Err(StoreError::CorruptChain { bucket, offset });
    }
    Ok(())
}

/// Grow a log so `len` bytes fit at `position`
fn ensure_room(log: &ViewManager, position: u64, len: u64) -> Result<()> {
    if log.enough_capacity(position, len) {
        return Ok(());
    }
    let needed = position.checked_add(len).ok_or(StoreError::CapacityExceeded {
        requested: u64::MAX,
        limit: crate::mmap::MAX_MAPPED_BYTES,
    })?;
    log.grow(needed)?;
    Ok(())
}

/// Lazy walk over the key records of a range of buckets
///
/// Stops after the first error.
pub(crate) struct RecordIter<'a> {
    table: &'a RawTable,
    buckets: Range<u64>,
    bucket: u64,
    prev: u64,
    next: u64,
    done: bool,
}

impl Iterator for RecordIter<'_> {
    type Item = Result<KeyRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Advance to the next non-empty chain
        while self.next == 0 {
            let bucket = match self.buckets.next() {
                Some(b) => b,
                None => {
                    self.done = true;
                    return None;
                }
            };
            match self.table.buckets.get(bucket) {
                Ok(head) => {
                    self.bucket = bucket;
                    self.prev = 0;
                    self.next = head;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        match self.table.record_at(self.bucket, self.prev, self.next) {
            Ok(record) => {
                self.prev = record.offset;
                self.next = record.next;
                Some(Ok(record))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
