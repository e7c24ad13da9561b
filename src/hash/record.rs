//! On-disk record layout for the key and value logs
//!
//! ```text
//! Key record:   [keyLen: varint][key bytes][valueOffset: u64 LE][next: 9-byte slot]
//! Value record: [valueLen: varint][value bytes]
//! ```
//!
//! The next slot is always 9 bytes wide: a varint padded with zeros, so the
//! link can be rewritten in place no matter how large the new offset is.

use crate::error::{Result, StoreError};
use crate::mmap::View;
use crate::varint::{self, MAX_VARINT_LEN};

/// Width of the fixed value-offset field
pub(crate) const VALUE_OFFSET_LEN: u64 = 8;

/// Width of the in-place rewritable next-offset slot
pub(crate) const NEXT_SLOT_LEN: u64 = MAX_VARINT_LEN as u64;

/// Decoded header of a key record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyRecord {
    pub offset: u64,
    pub key_start: u64,
    pub key_len: u64,
    pub value_offset: u64,
    pub next: u64,
}

impl KeyRecord {
    /// Total bytes a record for a key of `key_len` bytes occupies
    pub fn encoded_len(key_len: u64) -> u64 {
        varint::varint_len(key_len) as u64 + key_len + VALUE_OFFSET_LEN + NEXT_SLOT_LEN
    }

    /// Parse the record starting at `offset`
    pub fn read(view: &mut View, offset: u64) -> Result<Self> {
        view.seek(offset)?;
        let key_len = view.read_varint()?;
        let key_start = view.position();

        let value_field = key_start
            .checked_add(key_len)
            .filter(|end| *end <= view.len())
            .ok_or_else(|| {
                StoreError::Corruption(format!(
                    "key record at {} claims {} key bytes past end of log",
                    offset, key_len
                ))
            })?;
        view.seek(value_field)?;

        let value_offset = view.read_u64()?;
        let (next, _) = varint::decode_varint(view.read_slice(NEXT_SLOT_LEN)?)?;

        Ok(Self {
            offset,
            key_start,
            key_len,
            value_offset,
            next,
        })
    }

    /// Append a record with an empty next link, returning its end offset
    pub fn append(view: &mut View, offset: u64, key: &[u8], value_offset: u64) -> Result<u64> {
        view.seek(offset)?;
        view.write_varint(key.len() as u64)?;
        view.write_all(key)?;
        view.write_u64(value_offset)?;

        let slot = view.position();
        write_next(view, slot, 0)?;
        Ok(slot + NEXT_SLOT_LEN)
    }

    /// Borrow the key bytes of this record
    pub fn key<'v>(&self, view: &'v View) -> Result<&'v [u8]> {
        view.slice(self.key_start, self.key_len)
    }

    /// Offset of the next-offset slot
    pub fn next_slot(&self) -> u64 {
        self.key_start + self.key_len + VALUE_OFFSET_LEN
    }

    /// First byte after this record
    pub fn end(&self) -> u64 {
        self.next_slot() + NEXT_SLOT_LEN
    }
}

/// Rewrite a next-offset slot in place
pub(crate) fn write_next(view: &mut View, slot: u64, next: u64) -> Result<()> {
    let buf = view.slice_mut(slot, NEXT_SLOT_LEN)?;
    buf.fill(0);
    varint::encode_varint(next, buf);
    Ok(())
}

/// Value log record helpers
pub(crate) struct ValueRecord;

impl ValueRecord {
    pub fn encoded_len(value_len: u64) -> u64 {
        varint::varint_len(value_len) as u64 + value_len
    }

    /// Append a value record, returning its end offset
    pub fn append(view: &mut View, offset: u64, value: &[u8]) -> Result<u64> {
        view.seek(offset)?;
        view.write_varint(value.len() as u64)?;
        view.write_all(value)?;
        Ok(view.position())
    }

    /// Copy out the value bytes of the record at `offset`
    pub fn read(view: &mut View, offset: u64) -> Result<Vec<u8>> {
        let len = Self::header(view, offset)?;
        Ok(view.read_slice(len)?.to_vec())
    }

    /// End offset of the record at `offset`, checked against the log size
    pub fn end(view: &mut View, offset: u64) -> Result<u64> {
        let len = Self::header(view, offset)?;
        let start = view.position();
        Ok(start + len)
    }

    /// Read the length prefix, leaving the cursor at the value bytes
    fn header(view: &mut View, offset: u64) -> Result<u64> {
        view.seek(offset)?;
        let len = view.read_varint()?;
        let fits = view
            .position()
            .checked_add(len)
            .is_some_and(|end| end <= view.len());
        if !fits {
            return Err(StoreError::Corruption(format!(
                "value record at {} claims {} bytes past end of log",
                offset, len
            )));
        }
        Ok(len)
    }
}
