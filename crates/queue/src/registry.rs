//! Named-queue directory with global aggregates.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::file::UploadFile;
use crate::queue::Queue;

/// Directory of named [`Queue`]s.
///
/// Held and injected explicitly by the application; there is no ambient
/// global. Queues are created lazily and live for the registry's lifetime.
/// Global aggregates are recomputed on every read from current member
/// state.
#[derive(Default)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<String, Arc<Queue>>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a queue by name.
    pub fn find(&self, name: &str) -> Option<Arc<Queue>> {
        self.queues.read().unwrap().get(name).cloned()
    }

    /// Returns the queue named `name`, creating it if absent.
    ///
    /// Idempotent: repeated calls with the same name return the same queue.
    pub fn create(&self, name: &str) -> Arc<Queue> {
        let mut queues = self.queues.write().unwrap();
        if let Some(queue) = queues.get(name) {
            return Arc::clone(queue);
        }
        debug!(queue = name, "queue created");
        let queue = Queue::new(name);
        queues.insert(name.to_string(), Arc::clone(&queue));
        queue
    }

    /// Snapshot of all registered queues.
    pub fn queues(&self) -> Vec<Arc<Queue>> {
        self.queues.read().unwrap().values().cloned().collect()
    }

    /// All files across all queues.
    pub fn files(&self) -> Vec<Arc<UploadFile>> {
        self.queues()
            .iter()
            .flat_map(|queue| queue.files())
            .collect()
    }

    /// Sum of file sizes across all queues.
    pub fn size(&self) -> u64 {
        self.queues().iter().map(|queue| queue.size()).sum()
    }

    /// Sum of bytes sent across all queues.
    pub fn loaded(&self) -> u64 {
        self.queues().iter().map(|queue| queue.loaded()).sum()
    }

    /// Global percentage (0-100, integer floor; 0 when nothing is queued).
    pub fn progress(&self) -> u64 {
        let size = self.size();
        if size == 0 {
            return 0;
        }
        self.loaded() * 100 / size
    }
}
