// Notification sink: workers post results, one consumer applies them.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::debug;

use super::discovery::ScanReport;
use super::registry::TaskKey;
use crate::device::traits::{DeviceHandle, RemoteEntry, Route};

/// Everything the presentation layer observes.
#[derive(Debug, Clone)]
pub enum Notification {
    DevicesCleared,
    DeviceAdded(DeviceHandle),
    RoutesCleared,
    RouteAdded(Route),
    RouteRemoved(Route),
    DirectoryListed {
        path: String,
        entries: Vec<RemoteEntry>,
    },
    CompositeProgress {
        task: TaskKey,
        percent: u32,
    },
    DownloadProgress {
        path: PathBuf,
        percent: u32,
    },
    ScanFinished(ScanReport),
    /// A user-facing failure message. Detail has already been logged.
    Error {
        message: String,
    },
}

/// Must tolerate concurrent calls from any worker.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink backed by an unbounded channel drained by a single consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("notification consumer gone, dropping update");
        }
    }
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}
