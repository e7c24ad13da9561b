//! Tests for the View Manager and the idle-view reaper
//!
//! These tests verify:
//! - Opening requires an existing directory
//! - Every thread gets its own view and cursor
//! - Data survives growth and is visible to every thread afterwards
//! - Reset zeroes the file
//! - Idle views are swept, and recreated on next use
//! - Dispose closes the file and optionally deletes it

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use mapstore::mmap::{ViewManager, ViewOptions, ViewReaper};
use mapstore::StoreError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_manager(dir: &TempDir, name: &str, bytes: u64) -> ViewManager {
    ViewManager::open(dir.path().join(name), bytes, 1, ViewOptions::default()).unwrap()
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_missing_directory_is_invalid_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing").join("file.bin");

    let result = ViewManager::open(&path, 16, 1, ViewOptions::default());
    assert!(matches!(result, Err(StoreError::InvalidPath(p)) if p == path));
}

#[test]
fn test_open_keeps_larger_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("existing.bin");
    std::fs::write(&path, vec![7u8; 100]).unwrap();

    let manager = ViewManager::open(&path, 10, 1, ViewOptions::default()).unwrap();
    assert_eq!(manager.len_bytes(), 100);
    assert_eq!(manager.with_view(|v| Ok(v.slice(99, 1)?[0])).unwrap(), 7);
}

#[test]
fn test_truncate_discards_content() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("truncate.bin");
    std::fs::write(&path, vec![7u8; 100]).unwrap();

    let options = ViewOptions {
        truncate: true,
        ..ViewOptions::default()
    };
    let manager = ViewManager::open(&path, 10, 1, options).unwrap();
    assert_eq!(manager.len_bytes(), 10);
    assert_eq!(manager.with_view(|v| Ok(v.slice(0, 10)?.to_vec())).unwrap(), vec![0; 10]);
}

// =============================================================================
// Per-Thread View Tests
// =============================================================================

#[test]
fn test_threads_have_independent_cursors() {
    let temp_dir = TempDir::new().unwrap();
    let manager = Arc::new(open_manager(&temp_dir, "cursors.bin", 64));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                manager.with_view(|v| v.seek(t * 8)).unwrap();
                barrier.wait();
                // Other threads have seeked in between; our cursor must not move
                manager.with_view(|v| Ok(v.position())).unwrap()
            })
        })
        .collect();

    let positions: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(positions, vec![0, 8, 16, 24]);
    assert_eq!(manager.view_count(), 4);
}

#[test]
fn test_growth_is_visible_to_all_threads() {
    let temp_dir = TempDir::new().unwrap();
    let manager = Arc::new(open_manager(&temp_dir, "grow.bin", 16));

    manager.with_view(|v| v.write_all(b"header")).unwrap();

    let reader = Arc::clone(&manager);
    let before = thread::spawn(move || reader.with_view(|v| Ok(v.len())).unwrap())
        .join()
        .unwrap();
    assert_eq!(before, 16);

    manager.grow(4096).unwrap();
    manager
        .with_view(|v| {
            v.seek(4000)?;
            v.write_all(b"tail")
        })
        .unwrap();

    let reader = Arc::clone(&manager);
    let (len, head, tail) = thread::spawn(move || {
        reader
            .with_view(|v| Ok((v.len(), v.slice(0, 6)?.to_vec(), v.slice(4000, 4)?.to_vec())))
            .unwrap()
    })
    .join()
    .unwrap();

    assert_eq!(len, manager.len_bytes());
    assert_eq!(head, b"header");
    assert_eq!(tail, b"tail");
}

#[test]
fn test_access_past_end_is_out_of_range() {
    let temp_dir = TempDir::new().unwrap();
    let manager = open_manager(&temp_dir, "bounds.bin", 8);

    let result = manager.with_view(|v| v.slice(4, 8).map(|s| s.to_vec()));
    assert!(matches!(result, Err(StoreError::IndexOutOfRange { .. })));
    assert!(manager.enough_capacity(4, 4));
    assert!(!manager.enough_capacity(4, 5));
}

#[test]
fn test_reset_zeroes_file() {
    let temp_dir = TempDir::new().unwrap();
    let manager = open_manager(&temp_dir, "reset.bin", 32);

    manager.with_view(|v| v.write_all(&[0xFF; 32])).unwrap();
    manager.reset(8).unwrap();

    assert_eq!(manager.len_bytes(), 8);
    assert_eq!(manager.with_view(|v| Ok(v.slice(0, 8)?.to_vec())).unwrap(), vec![0; 8]);
}

// =============================================================================
// Reaper Tests
// =============================================================================

#[test]
fn test_sweep_closes_idle_views() {
    let temp_dir = TempDir::new().unwrap();
    let manager = open_manager(&temp_dir, "sweep.bin", 16);

    manager.with_view(|v| v.write_all(b"kept")).unwrap();
    assert_eq!(manager.view_count(), 1);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(manager.sweep_idle(Duration::from_millis(5)), 1);
    assert_eq!(manager.view_count(), 0);

    // Recreated lazily; data was flushed through the shared mapping
    assert_eq!(manager.with_view(|v| Ok(v.slice(0, 4)?.to_vec())).unwrap(), b"kept");
    assert_eq!(manager.view_count(), 1);
}

#[test]
fn test_sweep_keeps_recent_views() {
    let temp_dir = TempDir::new().unwrap();
    let manager = open_manager(&temp_dir, "recent.bin", 16);

    manager.with_view(|v| v.seek(1)).unwrap();
    assert_eq!(manager.sweep_idle(Duration::from_secs(3600)), 0);
    assert_eq!(manager.view_count(), 1);
}

#[test]
fn test_reaper_thread_sweeps_registered_managers() {
    let temp_dir = TempDir::new().unwrap();
    let manager = open_manager(&temp_dir, "reaper.bin", 16);

    let reaper = ViewReaper::spawn(Duration::from_millis(10), Duration::from_millis(1)).unwrap();
    reaper.register(&manager);
    assert_eq!(reaper.registered(), 1);

    manager.with_view(|v| v.seek(2)).unwrap();

    let mut swept = false;
    for _ in 0..200 {
        if manager.view_count() == 0 {
            swept = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(swept, "reaper never closed the idle view");
}

#[test]
fn test_reaper_sweep_now() {
    let temp_dir = TempDir::new().unwrap();
    let first = open_manager(&temp_dir, "a.bin", 16);
    let second = open_manager(&temp_dir, "b.bin", 16);

    // Long interval: only the manual sweep runs
    let reaper = ViewReaper::spawn(Duration::from_secs(3600), Duration::ZERO).unwrap();
    reaper.register(&first);
    reaper.register(&second);

    first.with_view(|v| v.seek(0)).unwrap();
    second.with_view(|v| v.seek(0)).unwrap();

    assert_eq!(reaper.sweep_now(), 2);

    // Dropped managers fall out of the registry
    drop(second);
    assert_eq!(reaper.registered(), 1);
}

// =============================================================================
// Dispose Tests
// =============================================================================

#[test]
fn test_dispose_deletes_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("gone.bin");
    let manager = ViewManager::open(&path, 16, 1, ViewOptions::default()).unwrap();

    manager.dispose(true).unwrap();
    assert!(!path.exists());
}

#[test]
fn test_delete_on_drop() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dropped.bin");
    let options = ViewOptions {
        delete_on_drop: true,
        ..ViewOptions::default()
    };

    let manager = ViewManager::open(&path, 16, 1, options).unwrap();
    assert!(path.exists());
    drop(manager);
    assert!(!path.exists());
}
