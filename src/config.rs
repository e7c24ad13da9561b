//! Configuration for mapstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Main configuration for a mapstore instance
#[derive(Debug, Clone)]
pub struct StoreConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the store files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {name}.hash      (bucket index)
    ///     ├── {name}.key       (key log)
    ///     ├── {name}.value     (value log)
    ///     └── {name}.control   (only for kept stores)
    pub data_dir: PathBuf,

    /// Store name; `None` generates an anonymous `anon-<uuid>` name
    pub name: Option<String>,

    /// Requested bucket count, rounded up to the next prime
    pub capacity: u64,

    /// Keep the files after close and allow reopening them later
    pub keep: bool,

    // -------------------------------------------------------------------------
    // Growth Configuration
    // -------------------------------------------------------------------------
    /// Multiplier applied to the requested size when a backing file grows
    pub growth_factor: f64,

    /// Initial size of the key log (bytes)
    pub initial_key_log_bytes: u64,

    /// Initial size of the value log (bytes)
    pub initial_value_log_bytes: u64,

    // -------------------------------------------------------------------------
    // View Reaper Configuration
    // -------------------------------------------------------------------------
    /// Views unused for longer than this are closed by the reaper
    pub view_idle_timeout: Duration,

    /// How often the reaper sweeps; `None` disables the reaper thread
    pub reaper_interval: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir(),
            name: None,
            capacity: 1_000,
            keep: false,
            growth_factor: 1.25,
            initial_key_log_bytes: 64 * 1024,   // 64 KB
            initial_value_log_bytes: 64 * 1024, // 64 KB
            view_idle_timeout: Duration::from_secs(60 * 60),
            reaper_interval: Some(Duration::from_secs(60 * 60)),
        }
    }
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Check the values that would otherwise fail deep inside the engine
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(StoreError::Config("capacity must be at least 1".to_string()));
        }
        if !(self.growth_factor >= 1.0) {
            return Err(StoreError::Config(format!(
                "growth factor must be >= 1.0, got {}",
                self.growth_factor
            )));
        }
        if let Some(name) = &self.name {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(StoreError::Config(format!("invalid store name: {:?}", name)));
            }
        }
        if self.initial_key_log_bytes == 0 || self.initial_value_log_bytes == 0 {
            return Err(StoreError::Config(
                "initial log sizes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the directory holding the store files
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the store name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Set the requested bucket count
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Keep files on close and enable reopening
    pub fn keep(mut self, keep: bool) -> Self {
        self.config.keep = keep;
        self
    }

    /// Set the file growth factor
    pub fn growth_factor(mut self, factor: f64) -> Self {
        self.config.growth_factor = factor;
        self
    }

    /// Set the initial key log size (in bytes)
    pub fn initial_key_log_bytes(mut self, bytes: u64) -> Self {
        self.config.initial_key_log_bytes = bytes;
        self
    }

    /// Set the initial value log size (in bytes)
    pub fn initial_value_log_bytes(mut self, bytes: u64) -> Self {
        self.config.initial_value_log_bytes = bytes;
        self
    }

    /// Set the idle timeout after which views are reaped
    pub fn view_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.view_idle_timeout = timeout;
        self
    }

    /// Set the reaper sweep interval (`None` disables the reaper)
    pub fn reaper_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.reaper_interval = interval;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
