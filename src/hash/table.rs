//! Typed disk hash table

use std::fs;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use uuid::Uuid;

use crate::codec::{self, Codec};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::mmap::{ViewOptions, ViewReaper};

use super::control::ControlFile;
use super::iter::{Iter, Keys, Values};
use super::raw::{LogSizing, RawTable, TableStats};
use super::{next_prime, StorePaths};

/// Hash table mapping `K` to `V`, persisted in memory-mapped files
///
/// ## Concurrency:
/// Mutating methods take `&mut self`; wrap the table in
/// [`DiskMap`](crate::map::DiskMap) to share it between threads. Read
/// methods may run concurrently, each thread using its own views.
pub struct DiskHashTable<K, V> {
    // Field order matters: the reaper is stopped before the regions close
    reaper: Option<ViewReaper>,
    raw: RawTable,
    name: String,
    paths: StorePaths,
    keep: bool,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: Codec + Hash, V: Codec> DiskHashTable<K, V> {
    /// Create a store, or reopen a kept one
    ///
    /// A kept store whose control file exists is reopened: its region files
    /// must all be present, and capacity and codec ids must match. Any other
    /// open starts empty, truncating files left under the same name.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        if !config.data_dir.is_dir() {
            return Err(StoreError::InvalidPath(config.data_dir.clone()));
        }

        let name = match &config.name {
            Some(name) => name.clone(),
            None => format!("anon-{}", Uuid::new_v4().simple()),
        };
        let paths = StorePaths::new(&config.data_dir, &name);
        let capacity = next_prime(config.capacity);
        let sizing = LogSizing {
            key_bytes: config.initial_key_log_bytes,
            value_bytes: config.initial_value_log_bytes,
        };

        let reopen = config.keep && paths.control.is_file();
        let raw = if reopen {
            Self::reopen(&paths, capacity, sizing, config.growth_factor)?
        } else {
            Self::create(&paths, capacity, sizing, config)?
        };

        let reaper = match config.reaper_interval {
            Some(interval) => {
                let reaper = ViewReaper::spawn(interval, config.view_idle_timeout)?;
                for manager in raw.managers() {
                    reaper.register(manager);
                }
                Some(reaper)
            }
            None => None,
        };

        tracing::info!(
            name = %name,
            capacity,
            count = raw.len(),
            keep = config.keep,
            reopened = reopen,
            "opened disk hash table"
        );

        Ok(Self {
            reaper,
            raw,
            name,
            paths,
            keep: config.keep,
            _marker: PhantomData,
        })
    }

    fn create(
        paths: &StorePaths,
        capacity: u64,
        sizing: LogSizing,
        config: &StoreConfig,
    ) -> Result<RawTable> {
        let options = ViewOptions {
            growth_factor: config.growth_factor,
            truncate: true,
            delete_on_drop: !config.keep,
        };

        if !config.keep && paths.control.exists() {
            fs::remove_file(&paths.control)?;
        }
        if config.keep && paths.regions().iter().any(|p| p.exists()) {
            tracing::warn!(
                control = %paths.control.display(),
                "region files found without a control file; discarding their contents"
            );
        }

        let raw = RawTable::create(paths, capacity, sizing, options)?;
        if config.keep {
            ControlFile::new(capacity, K::ID, V::ID).write(&paths.control)?;
        }
        Ok(raw)
    }

    fn reopen(
        paths: &StorePaths,
        capacity: u64,
        sizing: LogSizing,
        growth_factor: f64,
    ) -> Result<RawTable> {
        // Step 1: All region files must survive
        if let Some(missing) = paths.missing_region() {
            return Err(StoreError::MissingFile(missing));
        }

        // Step 2: Capacity and codecs must match what the store was built with
        let control = ControlFile::read(&paths.control)?;
        if control.capacity != capacity {
            return Err(StoreError::CapacityMismatch {
                stored: control.capacity,
                requested: capacity,
            });
        }
        check_codec("key", &control.key_codec, K::ID)?;
        check_codec("value", &control.value_codec, V::ID)?;

        // Step 3: Map the regions and rebuild count and cursors
        let options = ViewOptions {
            growth_factor,
            truncate: false,
            delete_on_drop: false,
        };
        RawTable::open_existing(paths, capacity, sizing, options)
    }

    /// Bucket index of `key`: crc32 of its `Hash` output
    pub fn bucket(&self, key: &K) -> u64 {
        let mut hasher = crc32fast::Hasher::new();
        key.hash(&mut hasher);
        (hasher.finish() & 0x7fff_ffff) % self.raw.capacity()
    }

    // =========================================================================
    // Map Operations
    // =========================================================================

    /// Insert a new entry; `DuplicateKey` if `key` is already present
    pub fn add(&mut self, key: &K, value: &V) -> Result<()> {
        let bucket = self.bucket(key);
        let key_bytes = key.to_bytes()?;
        let value_bytes = value.to_bytes()?;
        self.raw.insert(bucket, &key_bytes, &value_bytes)
    }

    /// Remove any entry for `key`, then add `value`
    ///
    /// The new records are appended and the old ones orphaned. Log growth
    /// happens before the unlink, so a failure keeps the previous entry.
    pub fn replace(&mut self, key: &K, value: &V) -> Result<()> {
        let bucket = self.bucket(key);
        let key_bytes = key.to_bytes()?;
        let value_bytes = value.to_bytes()?;
        self.raw.replace(bucket, &key_bytes, &value_bytes)
    }

    /// Unlink the entry for `key`, returning whether one existed
    pub fn remove(&mut self, key: &K) -> Result<bool> {
        let bucket = self.bucket(key);
        self.raw.remove(bucket, &key.to_bytes()?)
    }

    pub fn try_get(&self, key: &K) -> Result<Option<V>> {
        let bucket = self.bucket(key);
        match self.raw.get(bucket, &key.to_bytes()?)? {
            Some(bytes) => V::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        let bucket = self.bucket(key);
        self.raw.contains(bucket, &key.to_bytes()?)
    }

    /// Linear scan comparing serialized values
    pub fn contains_value(&self, value: &V) -> Result<bool> {
        let wanted = value.to_bytes()?;
        for record in self.raw.records(0..self.raw.capacity()) {
            if self.raw.value_bytes(record?.value_offset)? == wanted {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Drop every entry and shrink the files back to their initial sizes
    pub fn clear(&mut self) -> Result<()> {
        self.raw.clear()?;
        tracing::debug!(name = %self.name, "cleared disk hash table");
        Ok(())
    }

    /// Whether two values serialize to the same bytes
    pub fn byte_compare(a: &V, b: &V) -> Result<bool> {
        codec::byte_compare(a, b)
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.raw)
    }

    pub fn keys(&self) -> Keys<'_, K> {
        Keys::new(&self.raw)
    }

    pub fn values(&self) -> Values<'_, V> {
        Values::new(&self.raw)
    }

    // =========================================================================
    // Accessors / Lifecycle
    // =========================================================================

    pub fn len(&self) -> u64 {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Bucket count (a prime)
    pub fn capacity(&self) -> u64 {
        self.raw.capacity()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn keep(&self) -> bool {
        self.keep
    }

    pub fn stats(&self) -> Result<TableStats> {
        self.raw.stats()
    }

    /// Walk every chain, failing with `CorruptChain` on a cycle or dangling link
    pub fn verify(&self) -> Result<TableStats> {
        self.raw.verify()
    }

    /// Run one idle-view sweep now, returning the number of views closed
    pub fn sweep_idle_views(&self) -> usize {
        self.reaper.as_ref().map_or(0, ViewReaper::sweep_now)
    }

    pub fn flush(&self) -> Result<()> {
        self.raw.flush()
    }

    /// Close the store: kept stores are flushed and stay on disk, others are
    /// deleted
    pub fn dispose(mut self) -> Result<()> {
        drop(self.reaper.take());

        if self.keep {
            self.raw.flush()?;
        }
        let Self { raw, name, keep, .. } = self;
        raw.dispose(!keep)?;

        tracing::info!(name = %name, kept = keep, "disposed disk hash table");
        Ok(())
    }
}

impl<K, V> std::fmt::Debug for DiskHashTable<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskHashTable")
            .field("name", &self.name)
            .field("keep", &self.keep)
            .field("raw", &self.raw)
            .finish()
    }
}

fn check_codec(role: &'static str, stored: &str, requested: &str) -> Result<()> {
    if stored != requested {
        return Err(StoreError::CodecMismatch {
            role,
            stored: stored.to_string(),
            requested: requested.to_string(),
        });
    }
    Ok(())
}
