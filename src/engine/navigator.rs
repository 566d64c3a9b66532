// Remote directory browsing: a virtual current-path stack committed only after a listing succeeds.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::notify::{Notification, NotificationSink};
use super::retry::{retry_transient, RetryPolicy};
use crate::device::traits::{DeviceHandle, DeviceId, RemoteEntry};
use crate::error::{Result, ToolkitError};

/// Path segments from the device root (bottom) to the current directory (top).
///
/// Never empty; the bottom segment is never popped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryStack {
    segments: Vec<String>,
}

impl DirectoryStack {
    pub fn from_root(root: &str) -> Self {
        let mut stack = Self {
            segments: Vec::new(),
        };
        stack.reset(root);
        stack
    }

    /// Replace the stack with the segments of `root`. A leading `/` is kept as an empty bottom segment.
    pub fn reset(&mut self, root: &str) {
        self.segments.clear();
        for (i, segment) in root.split('/').enumerate() {
            if i == 0 || !segment.is_empty() {
                self.segments.push(segment.to_string());
            }
        }
    }

    /// The stack after navigating to `name`, or `None` when nothing would change.
    ///
    /// `"."` yields an identical stack (a refresh); `".."` at the root yields `None`.
    pub fn descended(&self, name: &str) -> Option<Self> {
        match name {
            "." => Some(self.clone()),
            ".." => {
                if self.segments.len() > 1 {
                    let mut next = self.clone();
                    next.segments.pop();
                    Some(next)
                } else {
                    None
                }
            }
            other => {
                let mut next = self.clone();
                next.segments.push(other.to_string());
                Some(next)
            }
        }
    }

    pub fn current_path(&self) -> String {
        let joined = self.segments.join("/");
        if joined.is_empty() {
            "/".to_string()
        } else {
            joined
        }
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

#[derive(Debug, Clone)]
struct Browsing {
    device: DeviceHandle,
    stack: DirectoryStack,
}

/// Browses one device's filesystem at a time. Navigations are serialized.
pub struct DirectoryNavigator {
    nav_lock: tokio::sync::Mutex<()>,
    state: Mutex<Option<Browsing>>,
    sink: Arc<dyn NotificationSink>,
    retry: RetryPolicy,
}

impl DirectoryNavigator {
    pub fn new(sink: Arc<dyn NotificationSink>, retry: RetryPolicy) -> Self {
        Self {
            nav_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(None),
            sink,
            retry,
        }
    }

    /// Start browsing `device` at `root`, discarding any previous position.
    pub async fn reset(&self, device: DeviceHandle, root: &str) -> Result<Vec<RemoteEntry>> {
        let _nav = self.nav_lock.lock().await;
        let stack = DirectoryStack::from_root(root);
        let entries = self.list(&device, &stack).await?;
        info!(
            "browsing device={} root={}",
            device.id(),
            stack.current_path()
        );
        *self.state.lock() = Some(Browsing { device, stack });
        Ok(entries)
    }

    /// Reset to the device's working directory unless it is already being browsed.
    ///
    /// Returns `None` when the device did not change.
    pub async fn select_device(&self, device: DeviceHandle) -> Result<Option<Vec<RemoteEntry>>> {
        if self.current_device().as_ref() == Some(&device.id()) {
            return Ok(None);
        }
        let root = device.working_directory();
        self.reset(device, &root).await.map(Some)
    }

    /// Navigate into `name` (`"."` refreshes, `".."` goes up).
    ///
    /// Returns `None` when the navigation was a no-op (ascending past the root).
    pub async fn descend(&self, name: &str) -> Result<Option<Vec<RemoteEntry>>> {
        let _nav = self.nav_lock.lock().await;
        let browsing = self
            .state
            .lock()
            .clone()
            .ok_or(ToolkitError::NoDeviceSelected)?;

        let Some(next) = browsing.stack.descended(name) else {
            debug!("already at root, ignoring ascend");
            return Ok(None);
        };

        let entries = self.list(&browsing.device, &next).await?;
        if let Some(state) = self.state.lock().as_mut() {
            state.stack = next;
        }
        Ok(Some(entries))
    }

    pub async fn ascend(&self) -> Result<Option<Vec<RemoteEntry>>> {
        self.descend("..").await
    }

    pub async fn refresh(&self) -> Result<Option<Vec<RemoteEntry>>> {
        self.descend(".").await
    }

    pub fn current_path(&self) -> Option<String> {
        self.state
            .lock()
            .as_ref()
            .map(|b| b.stack.current_path())
    }

    pub fn current_device(&self) -> Option<DeviceId> {
        self.state.lock().as_ref().map(|b| b.device.id())
    }

    pub fn device(&self) -> Option<DeviceHandle> {
        self.state.lock().as_ref().map(|b| Arc::clone(&b.device))
    }

    /// Forget the browsed device, e.g. after a rescan.
    pub fn clear(&self) {
        *self.state.lock() = None;
    }

    async fn list(&self, device: &DeviceHandle, stack: &DirectoryStack) -> Result<Vec<RemoteEntry>> {
        let path = stack.current_path();
        let remote_path = path.as_str();
        let mut entries = retry_transient(&self.retry, "directory listing", move || {
            device.enumerate_files(remote_path)
        })
        .await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("listed path={} entries={}", path, entries.len());
        self.sink.notify(Notification::DirectoryListed {
            path,
            entries: entries.clone(),
        });
        Ok(entries)
    }
}
