// Single-flight task registry: at most one running operation per logical key.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::device::traits::RouteId;

/// Logical identity of an operation. Export and delete share the route key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey(String);

impl TaskKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn route(id: &RouteId) -> Self {
        Self(id.0.clone())
    }

    pub fn gpx(id: &RouteId) -> Self {
        Self(format!("gpx:{}", id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    active: Mutex<HashSet<TaskKey>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `true` only for the caller that inserted it.
    pub fn try_begin(&self, key: &TaskKey) -> bool {
        let inserted = self.active.lock().insert(key.clone());
        if !inserted {
            debug!("task {} already running, submission dropped", key);
        }
        inserted
    }

    /// Release `key` once the owning task has finished, successfully or not.
    pub fn end(&self, key: &TaskKey) {
        self.active.lock().remove(key);
    }

    /// Claim `key` and release it automatically when the guard drops.
    pub fn acquire(self: &Arc<Self>, key: TaskKey) -> Option<TaskGuard> {
        if self.try_begin(&key) {
            Some(TaskGuard {
                registry: Arc::clone(self),
                key,
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, key: &TaskKey) -> bool {
        self.active.lock().contains(key)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

/// Ownership of a registry slot for the lifetime of one task.
#[derive(Debug)]
pub struct TaskGuard {
    registry: Arc<TaskRegistry>,
    key: TaskKey,
}

impl TaskGuard {
    pub fn key(&self) -> &TaskKey {
        &self.key
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.registry.end(&self.key);
    }
}
