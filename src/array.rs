//! Fixed Array Module
//!
//! Typed, bounds-checked array of fixed-size elements stored directly in a
//! memory-mapped file.
//!
//! ## Responsibilities
//! - Element `i` lives at byte `i * T::SIZE` of the backing file
//! - Reads through the calling thread's own view (concurrent readers never
//!   share a cursor)
//! - Optional auto-grow when writing past the end
//!
//! Used on its own and as the bucket index of the disk hash table.

use std::marker::PhantomData;
use std::path::Path;

use parking_lot::RwLock;

use crate::codec::FixedCodec;
use crate::error::{Result, StoreError};
use crate::mmap::{ViewManager, ViewOptions};

/// Memory-mapped array of `T`
///
/// ## Concurrency:
/// - `get`/iteration take the array's read lock
/// - `set` (including any growth it triggers) takes the write lock
/// - Growth additionally takes the view manager's exclusive lock
pub struct FixedArray<T> {
    manager: ViewManager,
    lock: RwLock<()>,
    auto_grow: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FixedCodec> FixedArray<T> {
    /// Create or open an array file holding at least `capacity` elements
    pub fn open(
        path: impl AsRef<Path>,
        capacity: u64,
        auto_grow: bool,
        options: ViewOptions,
    ) -> Result<Self> {
        let manager = ViewManager::open(path, capacity, T::SIZE as u64, options)?;
        Ok(Self {
            manager,
            lock: RwLock::new(()),
            auto_grow,
            _marker: PhantomData,
        })
    }

    /// Number of elements the backing file currently holds
    pub fn len(&self) -> u64 {
        self.manager.capacity_elements()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn auto_grow(&self) -> bool {
        self.auto_grow
    }

    /// Read the element at `index`
    pub fn get(&self, index: u64) -> Result<T> {
        let _guard = self.lock.read();
        self.read_at(index)
    }

    /// Write the element at `index`, growing the file first if allowed
    pub fn set(&self, index: u64, value: &T) -> Result<()> {
        let _guard = self.lock.write();

        let len = self.len();
        if index >= len {
            if !self.auto_grow {
                return Err(StoreError::IndexOutOfRange { index, len });
            }
            self.manager.grow(index.saturating_add(1))?;
        }

        let size = T::SIZE as u64;
        self.manager.with_view(|view| {
            view.seek(index * size)?;
            value.encode_fixed(view.write_slice(size)?);
            Ok(())
        })
    }

    /// Lazily iterate over every element from index 0
    ///
    /// Each call starts over from the beginning. Not safe against growth or
    /// writes by other threads while the iteration is in progress.
    pub fn iter(&self) -> Result<ArrayIter<'_, T>> {
        let len = {
            let _guard = self.lock.read();
            self.manager.with_view(|view| view.seek(0))?;
            self.len()
        };
        Ok(ArrayIter {
            array: self,
            index: 0,
            len,
        })
    }

    /// Grow to hold at least `min_len` elements, returning the new length
    pub fn grow(&self, min_len: u64) -> Result<u64> {
        let _guard = self.lock.write();
        self.manager.grow(min_len)
    }

    /// Zero every element, keeping `len` elements
    pub fn reset(&self, len: u64) -> Result<()> {
        let _guard = self.lock.write();
        self.manager.reset(len)
    }

    pub fn flush(&self) -> Result<()> {
        let _guard = self.lock.read();
        self.manager.flush()
    }

    pub fn path(&self) -> &Path {
        self.manager.path()
    }

    /// Access to the underlying view manager (for reaper registration)
    pub fn manager(&self) -> &ViewManager {
        &self.manager
    }

    /// Close the array, optionally deleting its file
    pub fn dispose(self, delete_file: bool) -> Result<()> {
        self.manager.dispose(delete_file)
    }

    fn read_at(&self, index: u64) -> Result<T> {
        let len = self.len();
        if index >= len {
            return Err(StoreError::IndexOutOfRange { index, len });
        }

        let size = T::SIZE as u64;
        self.manager.with_view(|view| {
            view.seek(index * size)?;
            Ok(T::decode_fixed(view.read_slice(size)?))
        })
    }
}

impl<T> std::fmt::Debug for FixedArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedArray")
            .field("manager", &self.manager)
            .field("auto_grow", &self.auto_grow)
            .finish()
    }
}

/// Lazy in-order iterator over a [`FixedArray`]
pub struct ArrayIter<'a, T> {
    array: &'a FixedArray<T>,
    index: u64,
    len: u64,
}

impl<T: FixedCodec> Iterator for ArrayIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.len {
            return None;
        }
        let item = self.array.get(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.len - self.index) as usize;
        (remaining, Some(remaining))
    }
}

impl<T: FixedCodec> ExactSizeIterator for ArrayIter<'_, T> {}
