//! Typed iterators over a [`DiskHashTable`](super::DiskHashTable)
//!
//! All three walk buckets in index order and each chain in link order,
//! decoding lazily. Each stops after yielding its first error.

use std::marker::PhantomData;

use crate::codec::Codec;
use crate::error::Result;

use super::raw::{RawTable, RecordIter};

/// Iterator over `(key, value)` pairs
pub struct Iter<'a, K, V> {
    table: &'a RawTable,
    records: RecordIter<'a>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(super) fn new(table: &'a RawTable) -> Self {
        Self {
            table,
            records: table.records(0..table.capacity()),
            _marker: PhantomData,
        }
    }
}

impl<K: Codec, V: Codec> Iterator for Iter<'_, K, V> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.and_then(|record| {
            let key = K::decode(&self.table.key_bytes(&record)?)?;
            let value = V::decode(&self.table.value_bytes(record.value_offset)?)?;
            Ok((key, value))
        }))
    }
}

/// Iterator over keys
pub struct Keys<'a, K> {
    table: &'a RawTable,
    records: RecordIter<'a>,
    _marker: PhantomData<fn() -> K>,
}

impl<'a, K> Keys<'a, K> {
    pub(super) fn new(table: &'a RawTable) -> Self {
        Self {
            table,
            records: table.records(0..table.capacity()),
            _marker: PhantomData,
        }
    }
}

impl<K: Codec> Iterator for Keys<'_, K> {
    type Item = Result<K>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.and_then(|record| K::decode(&self.table.key_bytes(&record)?)))
    }
}

/// Iterator over values
pub struct Values<'a, V> {
    table: &'a RawTable,
    records: RecordIter<'a>,
    _marker: PhantomData<fn() -> V>,
}

impl<'a, V> Values<'a, V> {
    pub(super) fn new(table: &'a RawTable) -> Self {
        Self {
            table,
            records: table.records(0..table.capacity()),
            _marker: PhantomData,
        }
    }
}

impl<V: Codec> Iterator for Values<'_, V> {
    type Item = Result<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.and_then(|record| V::decode(&self.table.value_bytes(record.value_offset)?)))
    }
}
