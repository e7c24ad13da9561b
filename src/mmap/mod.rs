//! Memory-Mapped View Module
//!
//! Owns growable memory-mapped backing files and hands out thread-affine views.
//!
//! ## Responsibilities
//! - Create/open one backing file per manager and keep it sized
//! - Give every calling thread its own mapping + cursor (no shared position)
//! - Grow the file by remapping, invalidating views through a generation counter
//! - Close views that sit idle (background reaper)
//!
//! ## Concurrency Model
//! ```text
//!   with_view()  ──► state.read()  ──► views registry ──► per-thread View
//!   grow()/reset()/sweep_idle() ──► state.write()  (exclusive, drops all views)
//! ```
//!
//! A view records the generation it was mapped at. Any exclusive operation
//! bumps the manager's generation, so a view that survives it is remapped on
//! its next use instead of touching a stale mapping.

mod manager;
mod reaper;
mod view;

pub use manager::{ViewManager, ViewOptions, MAX_MAPPED_BYTES};
pub use reaper::ViewReaper;
pub use view::View;
