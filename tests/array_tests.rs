//! Tests for FixedArray
//!
//! These tests verify:
//! - Bounds checking without auto-grow
//! - Transparent growth with auto-grow (existing data preserved)
//! - Lazy, restartable iteration
//! - Contents persist across reopen
//! - Concurrent readers alongside a growing writer

use std::sync::Arc;
use std::thread;

use mapstore::{FixedArray, StoreError, ViewOptions};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_array<T: mapstore::FixedCodec>(dir: &TempDir, capacity: u64, auto_grow: bool) -> FixedArray<T> {
    FixedArray::open(dir.path().join("array.bin"), capacity, auto_grow, ViewOptions::default()).unwrap()
}

// =============================================================================
// Bounds Tests
// =============================================================================

#[test]
fn test_set_get_within_capacity() {
    let temp_dir = TempDir::new().unwrap();
    let array: FixedArray<i64> = open_array(&temp_dir, 10, false);

    array.set(0, &-1).unwrap();
    array.set(9, &i64::MAX).unwrap();

    assert_eq!(array.get(0).unwrap(), -1);
    assert_eq!(array.get(9).unwrap(), i64::MAX);
    assert_eq!(array.get(5).unwrap(), 0);
}

#[test]
fn test_out_of_range_without_auto_grow() {
    let temp_dir = TempDir::new().unwrap();
    let array: FixedArray<u32> = open_array(&temp_dir, 4, false);

    assert!(matches!(
        array.get(4),
        Err(StoreError::IndexOutOfRange { index: 4, len: 4 })
    ));
    assert!(matches!(
        array.set(10, &1),
        Err(StoreError::IndexOutOfRange { index: 10, len: 4 })
    ));
    assert_eq!(array.len(), 4);
}

// =============================================================================
// Growth Tests
// =============================================================================

#[test]
fn test_auto_grow_preserves_contents() {
    let temp_dir = TempDir::new().unwrap();
    let array: FixedArray<u64> = open_array(&temp_dir, 10, true);

    for i in 0..10 {
        array.set(i, &(i * 3)).unwrap();
    }
    array.set(1_000, &42).unwrap();

    assert!(array.len() > 1_000);
    for i in 0..10 {
        assert_eq!(array.get(i).unwrap(), i * 3);
    }
    assert_eq!(array.get(1_000).unwrap(), 42);
    assert_eq!(array.get(500).unwrap(), 0);
}

#[test]
fn test_explicit_grow() {
    let temp_dir = TempDir::new().unwrap();
    let array: FixedArray<f64> = open_array(&temp_dir, 4, false);

    array.set(3, &1.5).unwrap();
    let len = array.grow(100).unwrap();
    assert!(len >= 100);
    assert_eq!(array.len(), len);
    assert_eq!(array.get(3).unwrap(), 1.5);
    array.set(99, &2.5).unwrap();
}

#[test]
fn test_readers_during_growth() {
    let temp_dir = TempDir::new().unwrap();
    let array: Arc<FixedArray<u64>> = Arc::new(open_array(&temp_dir, 8, true));
    for i in 0..8 {
        array.set(i, &(i + 100)).unwrap();
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let array = Arc::clone(&array);
            thread::spawn(move || {
                for _ in 0..200 {
                    for i in 0..8 {
                        assert_eq!(array.get(i).unwrap(), i + 100);
                    }
                }
            })
        })
        .collect();

    for i in 8..2_000 {
        array.set(i, &(i + 100)).unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(array.get(1_999).unwrap(), 2_099);
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iteration_is_ordered_and_restartable() {
    let temp_dir = TempDir::new().unwrap();
    let array: FixedArray<u16> = open_array(&temp_dir, 5, false);
    for i in 0..5u16 {
        array.set(i as u64, &(i * 2)).unwrap();
    }

    let first: Vec<u16> = array.iter().unwrap().map(|v| v.unwrap()).collect();
    let second: Vec<u16> = array.iter().unwrap().map(|v| v.unwrap()).collect();

    assert_eq!(first, vec![0, 2, 4, 6, 8]);
    assert_eq!(first, second);
    assert_eq!(array.iter().unwrap().len(), 5);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_reopen_sees_previous_contents() {
    let temp_dir = TempDir::new().unwrap();
    {
        let array: FixedArray<i32> = open_array(&temp_dir, 3, false);
        array.set(2, &-7).unwrap();
        array.flush().unwrap();
        array.dispose(false).unwrap();
    }

    let array: FixedArray<i32> = open_array(&temp_dir, 3, false);
    assert_eq!(array.get(2).unwrap(), -7);
}

#[test]
fn test_dispose_deletes_file() {
    let temp_dir = TempDir::new().unwrap();
    let array: FixedArray<bool> = open_array(&temp_dir, 3, false);
    let path = array.path().to_path_buf();

    array.set(1, &true).unwrap();
    array.dispose(true).unwrap();
    assert!(!path.exists());
}
