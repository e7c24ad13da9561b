//! View Manager
//!
//! Owns one growable backing file and the per-thread views mapped over it.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, StoreError};

use super::View;

/// Largest backing file this platform can map in one piece
pub const MAX_MAPPED_BYTES: u64 = isize::MAX as u64;

/// Options controlling how a backing file is opened and grown
#[derive(Debug, Clone, Copy)]
pub struct ViewOptions {
    /// Multiplier applied to the requested size on growth (>= 1.0)
    pub growth_factor: f64,

    /// Discard existing file content on open
    pub truncate: bool,

    /// Delete the backing file when the manager is dropped
    pub delete_on_drop: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            growth_factor: 1.25,
            truncate: false,
            delete_on_drop: false,
        }
    }
}

/// Manages one memory-mapped backing file
///
/// ## Concurrency:
/// - `state`: RwLock; view access holds it shared, grow/reset/sweep hold it
///   exclusively
/// - `views`: registry from thread id to that thread's view
/// - `generation`: bumped by every exclusive remap, checked before each use
pub struct ViewManager {
    shared: Arc<Shared>,
}

pub(super) struct Shared {
    path: PathBuf,
    element_size: u64,
    growth_factor: f64,
    state: RwLock<FileState>,
    views: Mutex<HashMap<ThreadId, Arc<Mutex<View>>>>,
    generation: AtomicU64,
    delete_on_drop: AtomicBool,
}

struct FileState {
    file: Option<File>,
    len: u64,
}

impl ViewManager {
    /// Create or open a backing file holding at least `capacity_elements`
    /// elements of `element_size` bytes
    ///
    /// An existing larger file keeps its size; a smaller one is extended.
    pub fn open(
        path: impl AsRef<Path>,
        capacity_elements: u64,
        element_size: u64,
        options: ViewOptions,
    ) -> Result<Self> {
        let path = path.as_ref();

        if element_size == 0 {
            return Err(StoreError::Config("element size must be non-zero".to_string()));
        }
        if !(options.growth_factor >= 1.0) {
            return Err(StoreError::Config(format!(
                "growth factor must be >= 1.0, got {}",
                options.growth_factor
            )));
        }

        // Step 1: The containing directory must already exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(StoreError::InvalidPath(path.to_path_buf()));
            }
        }

        // Step 2: Compute the requested size (never less than one element)
        let requested = checked_size(capacity_elements.max(1), element_size)?;

        // Step 3: Open and size the file
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(options.truncate)
            .open(path)?;

        let existing = file.metadata()?.len();
        let len = if existing < requested {
            file.set_len(requested)?;
            requested
        } else {
            existing
        };

        tracing::debug!(
            path = %path.display(),
            len,
            element_size,
            "opened backing file"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                path: path.to_path_buf(),
                element_size,
                growth_factor: options.growth_factor,
                state: RwLock::new(FileState {
                    file: Some(file),
                    len,
                }),
                views: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                delete_on_drop: AtomicBool::new(options.delete_on_drop),
            }),
        })
    }

    /// Run `f` against the calling thread's view
    ///
    /// The view is created on first use and remapped if a grow happened since
    /// it was last used. Calling `grow`, `reset` or `sweep_idle` on the same
    /// manager from inside `f` deadlocks.
    pub fn with_view<R>(&self, f: impl FnOnce(&mut View) -> Result<R>) -> Result<R> {
        let shared = &self.shared;
        let state = shared.state.read();
        let file = state.file.as_ref().ok_or(StoreError::Disposed)?;
        let generation = shared.generation.load(Ordering::Acquire);

        let slot = {
            let mut views = shared.views.lock();
            let id = thread::current().id();
            match views.get(&id) {
                Some(slot) => Arc::clone(slot),
                None => {
                    let slot = Arc::new(Mutex::new(View::map(file, state.len, generation)?));
                    views.insert(id, Arc::clone(&slot));
                    tracing::trace!(path = %shared.path.display(), ?id, "created view");
                    slot
                }
            }
        };

        let mut view = slot.lock();
        if view.generation != generation {
            *view = View::map(file, state.len, generation)?;
        }
        view.last_used = Instant::now();

        f(&mut view)
    }

    /// Grow the backing file to hold at least `min_size_elements` elements
    ///
    /// `new = max(min * element_size * growth_factor, current + element_size)`,
    /// rounded up to a whole element. Every view is dropped; threads remap on
    /// their next access. Returns the new length in elements.
    pub fn grow(&self, min_size_elements: u64) -> Result<u64> {
        let shared = &self.shared;
        let mut state = shared.state.write();
        let elem = shared.element_size;

        let min_bytes = checked_size(min_size_elements, elem)?;
        if min_bytes <= state.len {
            // Another caller already grew far enough
            return Ok(state.len / elem);
        }

        let scaled = (min_bytes as f64 * shared.growth_factor).ceil();
        let scaled = if scaled >= MAX_MAPPED_BYTES as f64 {
            u64::MAX
        } else {
            scaled as u64
        };
        let new_len = scaled
            .max(state.len.saturating_add(elem))
            .div_ceil(elem)
            .saturating_mul(elem);

        if new_len > MAX_MAPPED_BYTES {
            return Err(StoreError::CapacityExceeded {
                requested: new_len,
                limit: MAX_MAPPED_BYTES,
            });
        }

        let file = state.file.as_ref().ok_or(StoreError::Disposed)?;
        shared.close_views();
        file.set_len(new_len)?;

        let old_len = state.len;
        state.len = new_len;
        shared.generation.fetch_add(1, Ordering::AcqRel);

        tracing::debug!(
            path = %shared.path.display(),
            old_len,
            new_len,
            "grew backing file"
        );

        Ok(new_len / elem)
    }

    /// Zero the file and resize it to `capacity_elements` elements
    pub fn reset(&self, capacity_elements: u64) -> Result<()> {
        let shared = &self.shared;
        let mut state = shared.state.write();
        let new_len = checked_size(capacity_elements.max(1), shared.element_size)?;

        let file = state.file.as_ref().ok_or(StoreError::Disposed)?;
        shared.close_views();
        file.set_len(0)?;
        file.set_len(new_len)?;

        state.len = new_len;
        shared.generation.fetch_add(1, Ordering::AcqRel);

        tracing::debug!(path = %shared.path.display(), new_len, "reset backing file");
        Ok(())
    }

    /// Whether `length` bytes starting at `position` fit in the current file
    pub fn enough_capacity(&self, position: u64, length: u64) -> bool {
        let len = self.shared.state.read().len;
        position.checked_add(length).is_some_and(|end| end <= len)
    }

    /// Flush every live view to disk
    pub fn flush(&self) -> Result<()> {
        let state = self.shared.state.read();
        let file = state.file.as_ref().ok_or(StoreError::Disposed)?;

        let views: Vec<_> = self.shared.views.lock().values().cloned().collect();
        for slot in views {
            slot.lock().flush()?;
        }
        file.sync_data()?;
        Ok(())
    }

    /// Drop views unused for longer than `max_idle`, returning how many closed
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        self.shared.sweep_idle(max_idle)
    }

    /// Close all views and the file, optionally deleting the file
    pub fn dispose(self, delete_file: bool) -> Result<()> {
        let shared = &self.shared;
        {
            let mut state = shared.state.write();
            shared.close_views();
            state.file = None;
        }
        shared.delete_on_drop.store(false, Ordering::Release);

        if delete_file {
            fs::remove_file(&shared.path)?;
        }
        tracing::debug!(path = %shared.path.display(), delete_file, "disposed backing file");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn element_size(&self) -> u64 {
        self.shared.element_size
    }

    /// Current file length in bytes
    pub fn len_bytes(&self) -> u64 {
        self.shared.state.read().len
    }

    /// Current file length in whole elements
    pub fn capacity_elements(&self) -> u64 {
        self.len_bytes() / self.shared.element_size
    }

    /// Number of threads currently holding a view
    pub fn view_count(&self) -> usize {
        self.shared.views.lock().len()
    }

    /// Mapping generation; bumped by every grow or reset
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    pub(super) fn downgrade(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }
}

impl std::fmt::Debug for ViewManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewManager")
            .field("path", &self.shared.path)
            .field("element_size", &self.shared.element_size)
            .field("generation", &self.generation())
            .finish()
    }
}

impl Shared {
    /// Flush and drop every view; caller holds `state` exclusively
    fn close_views(&self) {
        let mut views = self.views.lock();
        for (_, slot) in views.drain() {
            if let Err(e) = slot.lock().flush() {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to flush view");
            }
        }
    }

    pub(super) fn sweep_idle(&self, max_idle: Duration) -> usize {
        // Same exclusive lock as grow, so a sweep never races a remap
        let _state = self.state.write();
        let mut views = self.views.lock();
        let before = views.len();

        views.retain(|_, slot| {
            let view = slot.lock();
            if view.last_used.elapsed() < max_idle {
                return true;
            }
            if let Err(e) = view.flush() {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to flush idle view");
            }
            false
        });

        let closed = before - views.len();
        if closed > 0 {
            tracing::debug!(path = %self.path.display(), closed, "closed idle views");
        }
        closed
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.views.get_mut().clear();
        self.state.get_mut().file = None;

        if self.delete_on_drop.load(Ordering::Acquire) {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to delete backing file");
            }
        }
    }
}

fn checked_size(elements: u64, element_size: u64) -> Result<u64> {
    match elements.checked_mul(element_size) {
        Some(bytes) if bytes <= MAX_MAPPED_BYTES => Ok(bytes),
        _ => Err(StoreError::CapacityExceeded {
            requested: elements.saturating_mul(element_size),
            limit: MAX_MAPPED_BYTES,
        }),
    }
}
