// Route export: multi-camera footage and GPX tracks, single-flight per route.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::notify::NotificationSink;
use super::progress::{ItemCounter, ProgressAggregator};
use super::registry::{TaskGuard, TaskKey, TaskRegistry};
use super::summary::OperationSummary;
use crate::device::traits::{CameraKind, DeviceHandle, ExportProgress, ProgressFn, Route, RouteId};
use crate::error::{Result, ToolkitError};

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub folder: PathBuf,
    pub cameras: Vec<CameraKind>,
    pub combine_segments: bool,
}

pub struct RouteExporter {
    registry: Arc<TaskRegistry>,
    sink: Arc<dyn NotificationSink>,
}

impl RouteExporter {
    pub fn new(registry: Arc<TaskRegistry>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { registry, sink }
    }

    /// Export every selected camera of every route.
    ///
    /// Routes already being exported or deleted are skipped. Within a route the
    /// cameras run concurrently; one failing camera fails the route while the
    /// other cameras' files stay on disk.
    pub async fn export_routes(
        &self,
        device: &DeviceHandle,
        routes: &[Route],
        request: &ExportRequest,
    ) -> Result<OperationSummary> {
        let available = device.cameras();
        let mut cameras: Vec<CameraKind> = request
            .cameras
            .iter()
            .copied()
            .filter(|c| available.contains(c))
            .collect();
        cameras.sort();
        cameras.dedup();
        if cameras.is_empty() {
            return Err(ToolkitError::NoCamerasSelected);
        }

        let mut summary = OperationSummary::default();
        let mut tasks = JoinSet::new();
        for route in routes {
            let Some(guard) = self.registry.acquire(TaskKey::route(&route.id)) else {
                summary.skipped.push(route.id.clone());
                continue;
            };
            tasks.spawn(export_route(
                guard,
                Arc::clone(device),
                route.clone(),
                cameras.clone(),
                request.folder.clone(),
                request.combine_segments,
                Arc::clone(&self.sink),
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(()))) => summary.completed.push(id),
                Ok((id, Err(e))) => {
                    error!("error exporting route {}: {}", id, e);
                    summary.failed.push((id, e));
                }
                Err(e) => error!("export task aborted: {}", e),
            }
        }
        summary.sort();
        Ok(summary)
    }

    /// Write `<folder>/<route>.gpx` for each route, concurrently.
    pub async fn export_gpx(
        &self,
        device: &DeviceHandle,
        routes: &[Route],
        folder: &Path,
    ) -> Result<OperationSummary> {
        tokio::fs::create_dir_all(folder).await?;

        let mut summary = OperationSummary::default();
        let mut tasks = JoinSet::new();
        for route in routes {
            let Some(guard) = self.registry.acquire(TaskKey::gpx(&route.id)) else {
                summary.skipped.push(route.id.clone());
                continue;
            };
            let dest = folder.join(format!("{}.gpx", route));
            tasks.spawn(export_gpx(
                guard,
                Arc::clone(device),
                route.clone(),
                dest,
                Arc::clone(&self.sink),
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(()))) => summary.completed.push(id),
                Ok((id, Err(e))) => {
                    error!("error generating gpx for {}: {}", id, e);
                    summary.failed.push((id, e));
                }
                Err(e) => error!("gpx task aborted: {}", e),
            }
        }
        summary.sort();
        Ok(summary)
    }
}

async fn export_route(
    guard: TaskGuard,
    device: DeviceHandle,
    route: Route,
    cameras: Vec<CameraKind>,
    folder: PathBuf,
    combine_segments: bool,
    sink: Arc<dyn NotificationSink>,
) -> (RouteId, Result<()>) {
    info!("exporting route={} cameras={}", route.id, cameras.len());
    let aggregator = Arc::new(ProgressAggregator::new(
        guard.key().clone(),
        cameras.iter().copied(),
        sink,
    ));

    let exports = cameras.iter().map(|&camera| {
        let aggregator = Arc::clone(&aggregator);
        let progress: ProgressFn<ExportProgress> = Arc::new(move |p: ExportProgress| {
            aggregator.report(p.camera, p.percent);
        });
        let device = &device;
        let route = &route;
        let folder = folder.as_path();
        async move {
            device
                .export_route(folder, route, camera, combine_segments, progress)
                .await
        }
    });
    let results = join_all(exports).await;

    let total = results.len();
    let mut failures = results.into_iter().filter_map(|r| r.err());
    let result = match failures.next() {
        None => {
            info!("exported route={} composite={}", route.id, aggregator.composite());
            Ok(())
        }
        Some(first) => Err(ToolkitError::BatchFailed {
            failed: 1 + failures.count(),
            total,
            first: Box::new(first),
        }),
    };
    drop(guard);
    (route.id, result)
}

async fn export_gpx(
    guard: TaskGuard,
    device: DeviceHandle,
    route: Route,
    dest: PathBuf,
    sink: Arc<dyn NotificationSink>,
) -> (RouteId, Result<()>) {
    let counter = Arc::new(ItemCounter::new(
        guard.key().clone(),
        route.segment_count,
        sink,
    ));
    let progress_counter = Arc::clone(&counter);
    let progress: ProgressFn<u32> = Arc::new(move |_segment| {
        progress_counter.increment();
    });

    let result = write_gpx(&device, &route, &dest, progress).await;
    if result.is_ok() {
        info!(
            "wrote gpx route={} segments={}/{} path={}",
            route.id,
            counter.processed(),
            counter.total(),
            dest.display()
        );
    }
    drop(guard);
    (route.id, result)
}

async fn write_gpx(
    device: &DeviceHandle,
    route: &Route,
    dest: &Path,
    progress: ProgressFn<u32>,
) -> Result<()> {
    let document = device.generate_gpx(route, progress).await?;
    tokio::fs::write(dest, &document).await?;
    Ok(())
}
