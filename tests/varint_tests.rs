//! Tests for the varint codec
//!
//! These tests verify:
//! - Round trip at every 7-bit group boundary
//! - Minimal encoded length
//! - Decoding ignores trailing bytes (zero-padded link slots)
//! - Truncated input is reported as corruption

use mapstore::varint::{decode_varint, encode_to_vec, encode_varint, varint_len, MAX_VARINT_LEN};
use mapstore::StoreError;

// =============================================================================
// Helper Functions
// =============================================================================

/// Values on both sides of every length boundary
fn boundary_values() -> Vec<u64> {
    let mut values = vec![0, 1, u64::MAX];
    for bits in (7..64).step_by(7) {
        let edge = 1u64 << bits;
        values.push(edge - 1);
        values.push(edge);
    }
    values
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_at_boundaries() {
    for value in boundary_values() {
        let encoded = encode_to_vec(value);
        let (decoded, used) = decode_varint(&encoded).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(used, encoded.len());
    }
}

#[test]
fn test_encoded_length_is_minimal() {
    assert_eq!(encode_to_vec(0).len(), 1);
    assert_eq!(encode_to_vec(127).len(), 1);
    assert_eq!(encode_to_vec(128).len(), 2);
    assert_eq!(encode_to_vec(16_383).len(), 2);
    assert_eq!(encode_to_vec(16_384).len(), 3);
    assert_eq!(encode_to_vec((1 << 56) - 1).len(), 8);
    assert_eq!(encode_to_vec(1 << 56).len(), 9);
    assert_eq!(encode_to_vec(u64::MAX).len(), MAX_VARINT_LEN);

    for value in boundary_values() {
        assert_eq!(varint_len(value), encode_to_vec(value).len());
    }
}

#[test]
fn test_low_group_comes_first() {
    assert_eq!(encode_to_vec(300), vec![0xAC, 0x02]);
}

// =============================================================================
// Slot Tests
// =============================================================================

#[test]
fn test_decode_stops_before_padding() {
    let mut slot = [0u8; MAX_VARINT_LEN];
    let written = encode_varint(1_000, &mut slot);

    let (value, used) = decode_varint(&slot).unwrap();
    assert_eq!(value, 1_000);
    assert_eq!(used, written);
}

#[test]
fn test_truncated_input_is_corruption() {
    let encoded = encode_to_vec(1 << 20);
    let result = decode_varint(&encoded[..encoded.len() - 1]);
    assert!(matches!(result, Err(StoreError::Corruption(_))));

    assert!(matches!(decode_varint(&[]), Err(StoreError::Corruption(_))));
}
