// Route list maintenance: loading from a device and single-flight deletion.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::notify::{Notification, NotificationSink};
use super::registry::{TaskGuard, TaskKey, TaskRegistry};
use super::retry::{retry_transient, RetryPolicy};
use super::summary::OperationSummary;
use crate::device::traits::{DeviceHandle, Route, RouteId};
use crate::error::Result;

pub struct RouteManager {
    registry: Arc<TaskRegistry>,
    sink: Arc<dyn NotificationSink>,
    retry: RetryPolicy,
}

impl RouteManager {
    pub fn new(
        registry: Arc<TaskRegistry>,
        sink: Arc<dyn NotificationSink>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            sink,
            retry,
        }
    }

    /// Replace the observed route list with the device's routes, posting each as it arrives.
    pub async fn load_routes(&self, device: &DeviceHandle) -> Result<usize> {
        self.sink.notify(Notification::RoutesCleared);
        let mut routes = device.routes();
        let mut count = 0;
        while let Some(route) = routes.next().await {
            self.sink.notify(Notification::RouteAdded(route?));
            count += 1;
        }
        info!("loaded {} routes from {}", count, device.id());
        Ok(count)
    }

    /// Delete routes concurrently. A route with a running export or delete is skipped.
    pub async fn delete_routes(&self, device: &DeviceHandle, routes: &[Route]) -> OperationSummary {
        let mut summary = OperationSummary::default();
        let mut tasks = JoinSet::new();
        for route in routes {
            let Some(guard) = self.registry.acquire(TaskKey::route(&route.id)) else {
                summary.skipped.push(route.id.clone());
                continue;
            };
            tasks.spawn(delete_route(
                guard,
                Arc::clone(device),
                route.clone(),
                Arc::clone(&self.sink),
                self.retry.clone(),
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(()))) => summary.completed.push(id),
                Ok((id, Err(e))) => {
                    error!("error deleting route {}: {}", id, e);
                    summary.failed.push((id, e));
                }
                Err(e) => error!("delete task aborted: {}", e),
            }
        }
        summary.sort();
        summary
    }
}

async fn delete_route(
    guard: TaskGuard,
    device: DeviceHandle,
    route: Route,
    sink: Arc<dyn NotificationSink>,
    retry: RetryPolicy,
) -> (RouteId, Result<()>) {
    let target = &device;
    let doomed = &route;
    let result = retry_transient(&retry, "delete route", move || target.delete_route(doomed)).await;
    if result.is_ok() {
        info!("deleted route {} from {}", route.id, device.id());
        sink.notify(Notification::RouteRemoved(route.clone()));
    }
    drop(guard);
    (route.id, result)
}
