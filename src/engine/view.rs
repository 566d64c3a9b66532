// Single-consumer fleet view: the only place user-observable collections change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::debug;

use super::discovery::ScanReport;
use super::notify::Notification;
use super::registry::TaskKey;
use crate::device::traits::{DeviceHandle, DeviceId, RemoteEntry, Route};

#[derive(Debug, Default)]
pub struct FleetView {
    devices: Vec<DeviceHandle>,
    selected: Option<DeviceId>,
    routes: Vec<Route>,
    directory: Option<(String, Vec<RemoteEntry>)>,
    progress: HashMap<TaskKey, u32>,
    downloads: HashMap<PathBuf, u32>,
    errors: Vec<String>,
    last_scan: Option<ScanReport>,
}

impl FleetView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain `rx` until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Notification>) -> Self {
        while let Some(notification) = rx.recv().await {
            self.apply(notification);
        }
        self
    }

    /// Apply everything currently queued without waiting for more.
    pub fn drain(&mut self, rx: &mut mpsc::UnboundedReceiver<Notification>) -> usize {
        let mut applied = 0;
        while let Ok(notification) = rx.try_recv() {
            self.apply(notification);
            applied += 1;
        }
        applied
    }

    pub fn apply(&mut self, notification: Notification) {
        match notification {
            Notification::DevicesCleared => {
                self.devices.clear();
                self.selected = None;
                self.directory = None;
            }
            Notification::DeviceAdded(device) => {
                let id = device.id();
                if self.devices.iter().any(|d| d.id() == id) {
                    debug!("device {} already listed", id);
                    return;
                }
                self.devices.push(device);
                if self.devices.len() == 1 {
                    self.selected = Some(id);
                }
            }
            Notification::RoutesCleared => self.routes.clear(),
            Notification::RouteAdded(route) => self.routes.push(route),
            Notification::RouteRemoved(route) => self.routes.retain(|r| r.id != route.id),
            Notification::DirectoryListed { path, entries } => {
                self.directory = Some((path, entries));
            }
            Notification::CompositeProgress { task, percent } => {
                self.progress.insert(task, percent);
            }
            Notification::DownloadProgress { path, percent } => {
                self.downloads.insert(path, percent);
            }
            Notification::ScanFinished(report) => self.last_scan = Some(report),
            Notification::Error { message } => self.errors.push(message),
        }
    }

    pub fn devices(&self) -> &[DeviceHandle] {
        &self.devices
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.id()).collect()
    }

    pub fn selected_device(&self) -> Option<DeviceHandle> {
        let selected = self.selected.as_ref()?;
        self.devices.iter().find(|d| &d.id() == selected).cloned()
    }

    pub fn select(&mut self, id: &DeviceId) -> bool {
        if self.devices.iter().any(|d| &d.id() == id) {
            self.selected = Some(id.clone());
            true
        } else {
            false
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn directory(&self) -> Option<&(String, Vec<RemoteEntry>)> {
        self.directory.as_ref()
    }

    pub fn progress(&self, task: &TaskKey) -> Option<u32> {
        self.progress.get(task).copied()
    }

    pub fn download_progress(&self, path: &Path) -> Option<u32> {
        self.downloads.get(path).copied()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn last_scan(&self) -> Option<&ScanReport> {
        self.last_scan.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::device::mock::MockDevice;

    #[test]
    fn test_first_device_is_selected_and_duplicates_ignored() {
        let mut view = FleetView::new();
        let a: DeviceHandle = Arc::new(MockDevice::new("a"));
        let b: DeviceHandle = Arc::new(MockDevice::new("b"));
        view.apply(Notification::DeviceAdded(a.clone()));
        view.apply(Notification::DeviceAdded(b));
        view.apply(Notification::DeviceAdded(a));

        assert_eq!(view.devices().len(), 2);
        assert_eq!(view.selected_device().unwrap().id(), DeviceId::from("a"));

        view.apply(Notification::DevicesCleared);
        assert!(view.devices().is_empty());
        assert!(view.selected_device().is_none());
    }

    #[test]
    fn test_route_add_remove() {
        let mut view = FleetView::new();
        view.apply(Notification::RouteAdded(Route::new("r1", 3)));
        view.apply(Notification::RouteAdded(Route::new("r2", 1)));
        view.apply(Notification::RouteRemoved(Route::new("r1", 3)));
        assert_eq!(view.routes(), &[Route::new("r2", 1)]);
    }

    #[test]
    fn test_select_only_listed_devices() {
        let mut view = FleetView::new();
        view.apply(Notification::DeviceAdded(Arc::new(MockDevice::new("a"))));
        view.apply(Notification::DeviceAdded(Arc::new(MockDevice::new("b"))));
        assert!(view.select(&DeviceId::from("b")));
        assert!(!view.select(&DeviceId::from("c")));
        assert_eq!(view.selected_device().unwrap().id(), DeviceId::from("b"));
    }

    #[tokio::test]
    async fn test_run_consumes_until_senders_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Notification::Error {
            message: "boom".to_string(),
        })
        .unwrap();
        drop(tx);
        let view = FleetView::new().run(rx).await;
        assert_eq!(view.errors(), &["boom".to_string()]);
    }
}
