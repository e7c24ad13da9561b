//! Idle View Reaper
//!
//! Background thread that periodically closes views nobody has used for a
//! while. Purely a resource optimization: a reaped view is recreated on the
//! next access of its thread.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use crate::error::Result;

use super::manager::Shared;
use super::ViewManager;

type Registry = Arc<Mutex<Vec<Weak<Shared>>>>;

/// Periodic sweeper for the views of registered managers
///
/// Holds only weak references, so registering a manager never keeps its file
/// alive. Dropping the reaper stops and joins the thread.
pub struct ViewReaper {
    managers: Registry,
    idle_timeout: Duration,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ViewReaper {
    /// Start a reaper that sweeps every `interval`, closing views idle for
    /// longer than `idle_timeout`
    pub fn spawn(interval: Duration, idle_timeout: Duration) -> Result<Self> {
        let managers: Registry = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let registry = Arc::clone(&managers);
        let handle = thread::Builder::new()
            .name("mapstore-view-reaper".to_string())
            .spawn(move || {
                let ticker = channel::tick(interval);
                loop {
                    crossbeam::select! {
                        // Sender dropped: the reaper is shutting down
                        recv(shutdown_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            Self::sweep(&registry, idle_timeout);
                        }
                    }
                }
                tracing::trace!("view reaper stopped");
            })?;

        Ok(Self {
            managers,
            idle_timeout,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Add a manager to the sweep list
    pub fn register(&self, manager: &ViewManager) {
        self.managers.lock().push(manager.downgrade());
    }

    /// Run one sweep on the calling thread, returning the number of views closed
    pub fn sweep_now(&self) -> usize {
        Self::sweep(&self.managers, self.idle_timeout)
    }

    /// Number of registered managers still alive
    pub fn registered(&self) -> usize {
        let mut managers = self.managers.lock();
        managers.retain(|weak| weak.strong_count() > 0);
        managers.len()
    }

    fn sweep(registry: &Registry, idle_timeout: Duration) -> usize {
        // Snapshot the live managers so the registry lock is not held while
        // waiting for a manager's exclusive lock
        let live: Vec<Arc<Shared>> = {
            let mut managers = registry.lock();
            managers.retain(|weak| weak.strong_count() > 0);
            managers.iter().filter_map(Weak::upgrade).collect()
        };

        live.iter().map(|shared| shared.sweep_idle(idle_timeout)).sum()
    }
}

impl Drop for ViewReaper {
    fn drop(&mut self) {
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("view reaper thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for ViewReaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewReaper")
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}
