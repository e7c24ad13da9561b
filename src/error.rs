//! Error types for mapstore
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for mapstore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid path: directory of {} does not exist", .0.display())]
    InvalidPath(PathBuf),

    #[error("File size of {requested} bytes exceeds the addressable limit of {limit} bytes")]
    CapacityExceeded { requested: u64, limit: u64 },

    #[error("Backing file has already been disposed")]
    Disposed,

    // -------------------------------------------------------------------------
    // Reopen Validation Errors
    // -------------------------------------------------------------------------
    #[error("Missing store file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Capacity mismatch: store was created with {stored}, reopened with {requested}")]
    CapacityMismatch { stored: u64, requested: u64 },

    #[error("Codec mismatch for {role}: store uses {stored:?}, caller uses {requested:?}")]
    CodecMismatch {
        role: &'static str,
        stored: String,
        requested: String,
    },

    // -------------------------------------------------------------------------
    // Map / Array Errors
    // -------------------------------------------------------------------------
    #[error("Key already exists")]
    DuplicateKey,

    #[error("Key not found")]
    KeyNotFound,

    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange { index: u64, len: u64 },

    #[error("Destination too small: {needed} slots needed, {available} available")]
    DestinationTooSmall { needed: usize, available: usize },

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt chain in bucket {bucket} at offset {offset}")]
    CorruptChain { bucket: u64, offset: u64 },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
