//! # mapstore
//!
//! A disk-backed key-value store built on memory-mapped files:
//! - Chained hash table whose buckets, keys and values live on disk
//! - Per-thread memory-mapped views with transparent file growth
//! - Concurrent readers, exclusive writers
//! - Optional persistence across process restarts (kept stores)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        DiskMap<K, V>                         │
//! │          (RwLock: recursive reads, upgradable set)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    DiskHashTable<K, V>                       │
//! │        (codecs, crc32 buckets, control file, reopen)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────┐
//!          ▼            ▼                 ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │ FixedArray  │ │   Key log   │ │  Value log  │
//!   │  (buckets)  │ │  (append)   │ │  (append)   │
//!   └──────┬──────┘ └──────┬──────┘ └──────┬──────┘
//!          └───────────────┼───────────────┘
//!                          ▼
//!                 ┌─────────────────┐
//!                 │   ViewManager   │◄──── ViewReaper
//!                 │ (per-thread mmap)│
//!                 └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod varint;
pub mod codec;
pub mod mmap;
pub mod array;
pub mod hash;
pub mod map;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::StoreConfig;
pub use codec::{Bincode, Codec, FixedCodec};
pub use array::FixedArray;
pub use hash::{inspect_store, DiskHashTable, StoreReport, TableStats};
pub use map::DiskMap;
pub use mmap::{ViewManager, ViewOptions};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of mapstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
