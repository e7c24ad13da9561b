//! Thread-owned view over a backing file
//!
//! A `View` is a whole-file mapping plus a read/write cursor. Views are only
//! created by the [`ViewManager`](super::ViewManager) and are never shared
//! between threads.

use std::fs::File;
use std::time::Instant;

use memmap2::{MmapMut, MmapOptions};

use crate::error::{Result, StoreError};
use crate::varint::{self, MAX_VARINT_LEN};

/// A mapped byte range with its own cursor
pub struct View {
    mmap: MmapMut,
    position: u64,
    pub(super) generation: u64,
    pub(super) last_used: Instant,
}

impl View {
    /// Map `len` bytes of `file`
    pub(super) fn map(file: &File, len: u64, generation: u64) -> Result<Self> {
        // SAFETY: the manager sets the file length before mapping and never
        // shrinks it while a view exists; every exclusive operation that
        // resizes the file first drops all views under the write lock.
        let mmap = unsafe { MmapOptions::new().len(len as usize).map_mut(file)? };

        Ok(Self {
            mmap,
            position: 0,
            generation,
            last_used: Instant::now(),
        })
    }

    /// Length of the mapped range in bytes
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Current cursor position
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the cursor; `position == len` is allowed (end of view)
    pub fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.len() {
            return Err(StoreError::IndexOutOfRange {
                index: position,
                len: self.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    // =========================================================================
    // Positional Access
    // =========================================================================

    /// Borrow `len` bytes at `offset` without moving the cursor
    pub fn slice(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.mmap[range])
    }

    /// Mutably borrow `len` bytes at `offset` without moving the cursor
    pub fn slice_mut(&mut self, offset: u64, len: u64) -> Result<&mut [u8]> {
        let range = self.range(offset, len)?;
        Ok(&mut self.mmap[range])
    }

    // =========================================================================
    // Cursor Access
    // =========================================================================

    /// Borrow the next `len` bytes and advance the cursor past them
    pub fn read_slice(&mut self, len: u64) -> Result<&[u8]> {
        let range = self.range(self.position, len)?;
        self.position += len;
        Ok(&self.mmap[range])
    }

    /// Mutably borrow the next `len` bytes and advance the cursor past them
    pub fn write_slice(&mut self, len: u64) -> Result<&mut [u8]> {
        let range = self.range(self.position, len)?;
        self.position += len;
        Ok(&mut self.mmap[range])
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let src = self.read_slice(buf.len() as u64)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.write_slice(buf.len() as u64)?.copy_from_slice(buf);
        Ok(())
    }

    /// Read a little-endian u64 at the cursor
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut raw = [0u8; 8];
        self.read_exact(&mut raw)?;
        Ok(u64::from_le_bytes(raw))
    }

    /// Write a little-endian u64 at the cursor
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    /// Decode a varint at the cursor, advancing past the bytes it used
    pub fn read_varint(&mut self) -> Result<u64> {
        let available = (self.len() - self.position).min(MAX_VARINT_LEN as u64);
        let window = self.slice(self.position, available)?;
        let (value, used) = varint::decode_varint(window)?;
        self.position += used as u64;
        Ok(value)
    }

    /// Encode a varint at the cursor, returning the number of bytes written
    pub fn write_varint(&mut self, value: u64) -> Result<usize> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let used = varint::encode_varint(value, &mut buf);
        self.write_all(&buf[..used])?;
        Ok(used)
    }

    pub(super) fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    fn range(&self, offset: u64, len: u64) -> Result<std::ops::Range<usize>> {
        let end = offset.checked_add(len).filter(|end| *end <= self.len());
        match end {
            Some(end) => Ok(offset as usize..end as usize),
            None => Err(StoreError::IndexOutOfRange {
                index: offset.saturating_add(len),
                len: self.len(),
            }),
        }
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("len", &self.mmap.len())
            .field("position", &self.position)
            .field("generation", &self.generation)
            .finish()
    }
}
