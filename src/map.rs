//! Map Facade Module
//!
//! Thread-safe dictionary over a [`DiskHashTable`].
//!
//! ## Concurrency Model
//! ```text
//!   get / try_get / contains_* / keys / iteration ──► read_recursive()
//!   set ──► upgradable_read() ──(value differs)──► upgrade ──► replace (remove + add)
//!   add / remove / clear ──► write()
//! ```
//!
//! Readers run concurrently; each uses its own per-thread views below the
//! table. An update is a remove followed by an add, so the new value is
//! appended and the old record is left unreachable in the logs.

use std::hash::Hash;
use std::path::Path;

use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};

use crate::codec::Codec;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::hash::{DiskHashTable, StorePaths, TableStats};

/// Disk-backed dictionary safe to share between threads (e.g. in an `Arc`)
pub struct DiskMap<K, V> {
    table: RwLock<DiskHashTable<K, V>>,
}

impl<K: Codec + Hash, V: Codec> DiskMap<K, V> {
    /// Open (or reopen, for kept stores) a map as described by `config`
    pub fn open(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            table: RwLock::new(DiskHashTable::open(config)?),
        })
    }

    /// Anonymous map in `dir` whose files are deleted on close
    pub fn temporary(dir: impl AsRef<Path>, capacity: u64) -> Result<Self> {
        let config = StoreConfig::builder()
            .data_dir(dir.as_ref())
            .capacity(capacity)
            .build();
        Self::open(&config)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or update
    ///
    /// Equal serialized bytes leave the store untouched.
    pub fn set(&self, key: &K, value: &V) -> Result<()> {
        let table = self.table.upgradable_read();
        let existing = table.try_get(key)?;

        match existing {
            Some(old) if DiskHashTable::<K, V>::byte_compare(value, &old)? => Ok(()),
            Some(_) => {
                let mut table = RwLockUpgradableReadGuard::upgrade(table);
                table.replace(key, value)
            }
            None => {
                let mut table = RwLockUpgradableReadGuard::upgrade(table);
                table.add(key, value)
            }
        }
    }

    /// Insert a new entry; `DuplicateKey` if `key` is already present
    pub fn add(&self, key: &K, value: &V) -> Result<()> {
        self.table.write().add(key, value)
    }

    pub fn remove(&self, key: &K) -> Result<bool> {
        self.table.write().remove(key)
    }

    pub fn clear(&self) -> Result<()> {
        self.table.write().clear()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Value for `key`; `KeyNotFound` if absent
    pub fn get(&self, key: &K) -> Result<V> {
        self.try_get(key)?.ok_or(StoreError::KeyNotFound)
    }

    pub fn try_get(&self, key: &K) -> Result<Option<V>> {
        self.table.read_recursive().try_get(key)
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.table.read_recursive().contains_key(key)
    }

    pub fn contains_value(&self, value: &V) -> Result<bool> {
        self.table.read_recursive().contains_value(value)
    }

    pub fn len(&self) -> u64 {
        self.table.read_recursive().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read_recursive().is_empty()
    }

    pub fn keys(&self) -> Result<Vec<K>> {
        self.table.read_recursive().keys().collect()
    }

    pub fn values(&self) -> Result<Vec<V>> {
        self.table.read_recursive().values().collect()
    }

    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        self.table.read_recursive().iter().collect()
    }

    /// Copy every entry into `dest` starting at `start`
    ///
    /// Slots before `start` and after the last entry are left untouched.
    pub fn copy_to(&self, dest: &mut [Option<(K, V)>], start: usize) -> Result<()> {
        if start > dest.len() {
            return Err(StoreError::IndexOutOfRange {
                index: start as u64,
                len: dest.len() as u64,
            });
        }

        let table = self.table.read_recursive();
        let available = dest.len() - start;
        let needed = usize::try_from(table.len()).unwrap_or(usize::MAX);
        if needed > available {
            return Err(StoreError::DestinationTooSmall { needed, available });
        }

        for (slot, entry) in dest[start..].iter_mut().zip(table.iter()) {
            *slot = Some(entry?);
        }
        Ok(())
    }

    /// Shared guard over the table, for lazy iteration without collecting
    ///
    /// Writers block until the guard is dropped.
    pub fn read(&self) -> RwLockReadGuard<'_, DiskHashTable<K, V>> {
        self.table.read_recursive()
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    pub fn name(&self) -> String {
        self.table.read_recursive().name().to_string()
    }

    pub fn paths(&self) -> StorePaths {
        self.table.read_recursive().paths().clone()
    }

    pub fn stats(&self) -> Result<TableStats> {
        self.table.read_recursive().stats()
    }

    pub fn verify(&self) -> Result<TableStats> {
        self.table.read_recursive().verify()
    }

    pub fn flush(&self) -> Result<()> {
        self.table.read_recursive().flush()
    }

    /// Close the map; kept stores stay on disk, others are deleted
    pub fn dispose(self) -> Result<()> {
        self.table.into_inner().dispose()
    }
}

impl<K, V> std::fmt::Debug for DiskMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.table.try_read_recursive() {
            Some(table) => f.debug_struct("DiskMap").field("table", &*table).finish(),
            None => f.debug_struct("DiskMap").finish_non_exhaustive(),
        }
    }
}
