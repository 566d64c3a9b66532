// Toolkit façade: owns every piece of shared orchestration state for one session.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::discovery::{DiscoveryOrchestrator, ScanReport};
use super::download::{DownloadOutcome, FileDownloader};
use super::exclusive::{StreamLease, StreamTokens};
use super::export::{ExportRequest, RouteExporter};
use super::navigator::DirectoryNavigator;
use super::notify::{Notification, NotificationSink};
use super::registry::TaskRegistry;
use super::remote::{CommandOutcome, RemoteControls};
use super::routes::RouteManager;
use super::summary::OperationSummary;
use super::watched::WatchedFiles;
use crate::config::EngineConfig;
use crate::device::traits::{
    DeviceDiscovery, DeviceHandle, FileOpener, RemoteCommand, RemoteEntry, Route,
};
use crate::error::{Result, ToolkitError};

/// What opening a browser entry did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    /// Navigated into a directory; `None` if the navigation was a no-op.
    Listed(Option<Vec<RemoteEntry>>),
    Downloaded(DownloadOutcome),
}

pub struct Toolkit {
    config: EngineConfig,
    sink: Arc<dyn NotificationSink>,
    registry: Arc<TaskRegistry>,
    discovery: DiscoveryOrchestrator,
    exporter: RouteExporter,
    routes: RouteManager,
    downloader: FileDownloader,
    navigator: DirectoryNavigator,
    streams: StreamTokens,
    controls: RemoteControls,
}

impl Toolkit {
    pub fn new(
        config: EngineConfig,
        discovery: Arc<dyn DeviceDiscovery>,
        sink: Arc<dyn NotificationSink>,
        opener: Arc<dyn FileOpener>,
    ) -> Self {
        let config = config.normalized();
        let registry = Arc::new(TaskRegistry::new());
        Self {
            discovery: DiscoveryOrchestrator::new(discovery, Arc::clone(&sink), &config),
            exporter: RouteExporter::new(Arc::clone(&registry), Arc::clone(&sink)),
            routes: RouteManager::new(
                Arc::clone(&registry),
                Arc::clone(&sink),
                config.connect_retry.clone(),
            ),
            downloader: FileDownloader::new(
                config.download_dir.clone(),
                config.download_chunk_size,
                Arc::clone(&sink),
                opener,
            ),
            navigator: DirectoryNavigator::new(Arc::clone(&sink), config.connect_retry.clone()),
            streams: StreamTokens::new(Duration::from_millis(config.stream_release_timeout_ms)),
            controls: RemoteControls::new(),
            registry,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn watched_files(&self) -> &WatchedFiles {
        self.downloader.watched()
    }

    pub fn is_scanning(&self) -> bool {
        self.discovery.is_scanning()
    }

    /// Rescan the network. Failures are also posted to the sink as a user message.
    pub async fn scan(&self) -> Result<ScanReport> {
        if !self.discovery.is_scanning() {
            self.navigator.clear();
        }
        self.surface(self.discovery.scan().await)
    }

    /// Rescan every `scan_interval_ms` until `shutdown` fires. The first scan runs immediately.
    pub fn spawn_periodic_scan(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let toolkit = Arc::clone(self);
        let interval = Duration::from_millis(self.config.scan_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("periodic scan stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = toolkit.scan().await {
                            debug!("periodic scan: {}", e);
                        }
                    }
                }
            }
        })
    }

    pub async fn load_routes(&self, device: &DeviceHandle) -> Result<usize> {
        self.surface(self.routes.load_routes(device).await)
    }

    pub async fn export_routes(
        &self,
        device: &DeviceHandle,
        routes: &[Route],
        request: &ExportRequest,
    ) -> Result<OperationSummary> {
        let summary = self.surface(self.exporter.export_routes(device, routes, request).await)?;
        self.surface_summary(&summary);
        Ok(summary)
    }

    pub async fn export_gpx(
        &self,
        device: &DeviceHandle,
        routes: &[Route],
        folder: &Path,
    ) -> Result<OperationSummary> {
        let summary = self.surface(self.exporter.export_gpx(device, routes, folder).await)?;
        self.surface_summary(&summary);
        Ok(summary)
    }

    pub async fn delete_routes(&self, device: &DeviceHandle, routes: &[Route]) -> OperationSummary {
        let summary = self.routes.delete_routes(device, routes).await;
        self.surface_summary(&summary);
        summary
    }

    /// Open the remote browser on `device`, resetting the path if the device changed.
    pub async fn browse(&self, device: DeviceHandle) -> Result<Option<Vec<RemoteEntry>>> {
        let result = self.navigator.select_device(device).await;
        self.surface(result)
    }

    /// Directories and symlinks navigate; anything else is downloaded and opened.
    pub async fn open_entry(&self, entry: &RemoteEntry) -> Result<EntryAction> {
        let device = self.navigator.device().ok_or(ToolkitError::NoDeviceSelected)?;
        let result = if entry.is_navigable() {
            self.navigator.descend(&entry.name).await.map(EntryAction::Listed)
        } else {
            self.downloader
                .download(&device, entry)
                .await
                .map(EntryAction::Downloaded)
        };
        self.surface(result)
    }

    pub async fn navigate_up(&self) -> Result<Option<Vec<RemoteEntry>>> {
        let result = self.navigator.ascend().await;
        self.surface(result)
    }

    pub fn current_path(&self) -> Option<String> {
        self.navigator.current_path()
    }

    /// Start playback of `route`, revoking the previous stream first.
    ///
    /// Routes without segments have nothing to play and leave the current stream alone.
    pub async fn select_route(&self, route: &Route) -> Option<StreamLease> {
        if route.segment_count == 0 {
            return None;
        }
        Some(self.streams.supersede().await)
    }

    pub async fn stop_playback(&self) {
        self.streams.revoke().await;
    }

    pub async fn run_command(
        &self,
        device: &DeviceHandle,
        command: RemoteCommand,
    ) -> Result<CommandOutcome> {
        let result = self.controls.run(device, command).await;
        self.surface(result)
    }

    fn surface<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("operation failed: {}", e);
            self.sink.notify(Notification::Error {
                message: e.to_string(),
            });
        }
        result
    }

    fn surface_summary(&self, summary: &OperationSummary) {
        if let Some(e) = summary.first_error() {
            self.sink.notify(Notification::Error {
                message: e.to_string(),
            });
        }
    }
}
