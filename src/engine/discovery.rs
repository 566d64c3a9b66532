// Device discovery: de-duplicates candidates and fans out bounded, concurrent authentication.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::notify::{Notification, NotificationSink};
use super::retry::{retry_transient, RetryPolicy};
use crate::config::EngineConfig;
use crate::device::traits::{DeviceDiscovery, DeviceHandle, DeviceId};
use crate::error::{Result, ToolkitError};

/// Outcome of one scan cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Distinct device identities seen on the discovery stream.
    pub discovered: usize,
    pub authenticated: Vec<DeviceId>,
    pub auth_failures: Vec<DeviceId>,
    pub unreachable: Vec<DeviceId>,
    pub unsupported: Vec<DeviceId>,
    /// Another scan was already running; nothing was done.
    pub skipped: bool,
}

impl ScanReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} discovered / {} authenticated",
            self.discovered,
            self.authenticated.len()
        )
    }

    /// Turn an empty or fully-unauthenticated scan into its user-facing error.
    pub fn into_result(self) -> Result<Self> {
        if self.skipped {
            return Ok(self);
        }
        if self.discovered == 0 {
            return Err(ToolkitError::NoDevicesFound);
        }
        if self.authenticated.is_empty() {
            return Err(ToolkitError::AuthenticationFailed {
                discovered: self.discovered,
            });
        }
        Ok(self)
    }
}

/// Identities seen during one scan. Insertion is an atomic test-and-set.
#[derive(Debug, Default)]
pub struct DiscoveredSet {
    ids: Mutex<HashSet<DeviceId>>,
}

impl DiscoveredSet {
    /// Returns `true` only for the first insertion of `id`.
    pub fn insert(&self, id: DeviceId) -> bool {
        self.ids.lock().insert(id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.ids.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

}

#[derive(Debug)]
enum ConnectOutcome {
    Authenticated(DeviceId),
    AuthFailed(DeviceId),
    Unreachable(DeviceId),
    Unsupported(DeviceId),
}

/// Resets the scan trigger when a scan ends, however it ends.
struct ScanTrigger<'a>(&'a AtomicBool);

impl Drop for ScanTrigger<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DiscoveryOrchestrator {
    discovery: Arc<dyn DeviceDiscovery>,
    sink: Arc<dyn NotificationSink>,
    connect_pool: Arc<Semaphore>,
    timeout: Duration,
    retry: RetryPolicy,
    scanning: AtomicBool,
}

impl DiscoveryOrchestrator {
    pub fn new(
        discovery: Arc<dyn DeviceDiscovery>,
        sink: Arc<dyn NotificationSink>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            discovery,
            sink,
            connect_pool: Arc::new(Semaphore::new(config.max_connect_concurrency.max(1))),
            timeout: Duration::from_millis(config.discovery_timeout_ms),
            retry: config.connect_retry.clone(),
            scanning: AtomicBool::new(false),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Run one scan cycle.
    ///
    /// The device list is cleared, the discovery stream is read until it ends
    /// or times out, and every distinct device gets exactly one connection task.
    /// All connection tasks are awaited before returning. Authenticated devices
    /// are published through the sink as they come in.
    pub async fn scan(&self) -> Result<ScanReport> {
        if self.scanning.swap(true, Ordering::AcqRel) {
            debug!("scan already running, trigger ignored");
            return Ok(ScanReport::skipped());
        }
        let _trigger = ScanTrigger(&self.scanning);

        self.sink.notify(Notification::DevicesCleared);
        self.sink.notify(Notification::RoutesCleared);

        let discovered = DiscoveredSet::default();
        let mut connections = JoinSet::new();
        let mut candidates = self.discovery.discover();
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    debug!("discovery timed out after {}ms", self.timeout.as_millis());
                    break;
                }
                candidate = candidates.next() => match candidate {
                    Some(device) => {
                        let id = device.id();
                        if discovered.insert(id.clone()) {
                            debug!("discovered device {}", id);
                            connections.spawn(connect_device(
                                device,
                                Arc::clone(&self.connect_pool),
                                Arc::clone(&self.sink),
                                self.retry.clone(),
                            ));
                        } else {
                            debug!("device {} reported again, skipping", id);
                        }
                    }
                    None => break,
                },
            }
        }
        drop(candidates);

        let mut report = ScanReport {
            discovered: discovered.len(),
            ..ScanReport::default()
        };
        while let Some(joined) = connections.join_next().await {
            match joined {
                Ok(ConnectOutcome::Authenticated(id)) => report.authenticated.push(id),
                Ok(ConnectOutcome::AuthFailed(id)) => report.auth_failures.push(id),
                Ok(ConnectOutcome::Unreachable(id)) => report.unreachable.push(id),
                Ok(ConnectOutcome::Unsupported(id)) => report.unsupported.push(id),
                Err(e) => error!("connection task aborted: {}", e),
            }
        }
        report.authenticated.sort();
        report.auth_failures.sort();
        report.unreachable.sort();
        report.unsupported.sort();

        info!(
            "scan finished discovered={} authenticated={} auth_failures={} unreachable={}",
            report.discovered,
            report.authenticated.len(),
            report.auth_failures.len(),
            report.unreachable.len()
        );
        self.sink.notify(Notification::ScanFinished(report.clone()));
        report.into_result()
    }
}

async fn connect_device(
    device: DeviceHandle,
    pool: Arc<Semaphore>,
    sink: Arc<dyn NotificationSink>,
    retry: RetryPolicy,
) -> ConnectOutcome {
    let id = device.id();
    if !device.is_supported() {
        debug!("device {} is not a supported model, not connecting", id);
        return ConnectOutcome::Unsupported(id);
    }

    // Queue behind the pool; devices beyond the ceiling wait here.
    let Ok(_permit) = pool.acquire_owned().await else {
        return ConnectOutcome::Unreachable(id);
    };

    if !device.is_authenticated() {
        let target = &device;
        match retry_transient(&retry, "connect", move || target.connect()).await {
            Ok(()) => {}
            Err(e) if e.is_authentication() => {
                warn!("authentication failed for {}: {}", id, e);
                return ConnectOutcome::AuthFailed(id);
            }
            Err(e) => {
                warn!("could not connect to {}: {}", id, e);
                return ConnectOutcome::Unreachable(id);
            }
        }
    }

    if device.is_authenticated() {
        info!("device {} authenticated", id);
        sink.notify(Notification::DeviceAdded(device));
        ConnectOutcome::Authenticated(id)
    } else {
        warn!("device {} connected but reports no authenticated session", id);
        ConnectOutcome::AuthFailed(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_distinguishes_failure_modes() {
        let empty = ScanReport::default();
        assert!(matches!(
            empty.into_result(),
            Err(ToolkitError::NoDevicesFound)
        ));

        let unauthenticated = ScanReport {
            discovered: 2,
            auth_failures: vec![DeviceId::from("a"), DeviceId::from("b")],
            ..ScanReport::default()
        };
        assert!(matches!(
            unauthenticated.into_result(),
            Err(ToolkitError::AuthenticationFailed { discovered: 2 })
        ));

        assert!(ScanReport::skipped().into_result().is_ok());
    }

    #[test]
    fn test_discovered_set_inserts_once() {
        let set = DiscoveredSet::default();
        assert!(set.is_empty());
        assert!(set.insert(DeviceId::from("a")));
        assert!(!set.insert(DeviceId::from("a")));
        assert!(set.insert(DeviceId::from("b")));
        assert!(set.contains(&DeviceId::from("a")));
        assert!(!set.contains(&DeviceId::from("c")));
        assert_eq!(set.len(), 2);
    }
}
