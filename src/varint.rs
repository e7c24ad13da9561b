//! Variable-Length Integer Encoding
//!
//! Compact encoding for the non-negative lengths and offsets stored in the
//! key and value logs.
//!
//! ## Encoding Format
//!
//! ```text
//! byte 0..8: [C|d d d d d d d]   7 data bits, C = more bytes follow
//! byte 8:    [d d d d d d d d]   full 8 data bits, never continued
//! ```
//!
//! Groups are little-endian (lowest 7 bits first). Values below 128 take one
//! byte; every further 7 bits costs one more byte, and the ninth byte carries
//! a whole octet so `u64::MAX` fits in 9 bytes.

use crate::error::{Result, StoreError};

/// Longest possible encoding
pub const MAX_VARINT_LEN: usize = 9;

const CONTINUATION: u8 = 0x80;
const DATA_MASK: u8 = 0x7f;

/// Number of bytes `encode_varint` writes for `value`
pub fn varint_len(value: u64) -> usize {
    for len in 1..MAX_VARINT_LEN {
        if value < 1u64 << (7 * len) {
            return len;
        }
    }
    MAX_VARINT_LEN
}

/// Encode `value` into `buf`, returning the number of bytes written
///
/// # Panics
///
/// Panics if `buf` is shorter than `varint_len(value)`.
pub fn encode_varint(value: u64, buf: &mut [u8]) -> usize {
    let mut v = value;
    for (i, slot) in buf.iter_mut().enumerate().take(MAX_VARINT_LEN - 1) {
        if v <= DATA_MASK as u64 {
            *slot = v as u8;
            return i + 1;
        }
        *slot = (v as u8 & DATA_MASK) | CONTINUATION;
        v >>= 7;
    }
    assert!(
        buf.len() >= MAX_VARINT_LEN,
        "varint buffer too short for {}",
        value
    );
    buf[MAX_VARINT_LEN - 1] = v as u8;
    MAX_VARINT_LEN
}

/// Encode `value` into a freshly allocated buffer of minimal length
pub fn encode_to_vec(value: u64) -> Vec<u8> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_varint(value, &mut buf);
    buf[..len].to_vec()
}

/// Decode a varint from the front of `buf`
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize)> {
    if buf.is_empty() {
        return Err(StoreError::Corruption(
            "empty buffer for varint decode".to_string(),
        ));
    }

    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let byte = match buf.get(i) {
            Some(&b) => b,
            None => {
                return Err(StoreError::Corruption(format!(
                    "truncated varint after {} bytes",
                    i
                )))
            }
        };

        if i == MAX_VARINT_LEN - 1 {
            value |= (byte as u64) << 56;
            return Ok((value, MAX_VARINT_LEN));
        }

        value |= ((byte & DATA_MASK) as u64) << (7 * i);
        if byte & CONTINUATION == 0 {
            return Ok((value, i + 1));
        }
    }

    unreachable!("loop returns by the ninth byte")
}
