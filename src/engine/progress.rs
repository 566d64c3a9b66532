// Composite progress: merges per-unit progress streams into one observable counter.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::notify::{Notification, NotificationSink};
use super::registry::TaskKey;

/// Sums the last percentage reported by each of a fixed set of units.
///
/// The composite ranges over `0..=100 * unit_count`; observers normalise by
/// [`ProgressAggregator::max_total`]. A unit's value never moves backwards, so
/// the composite is non-decreasing for the aggregator's lifetime.
pub struct ProgressAggregator<U> {
    task: TaskKey,
    units: Mutex<HashMap<U, u32>>,
    sink: Arc<dyn NotificationSink>,
}

impl<U> ProgressAggregator<U>
where
    U: Eq + Hash + Debug,
{
    pub fn new(
        task: TaskKey,
        units: impl IntoIterator<Item = U>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let units = units.into_iter().map(|u| (u, 0)).collect();
        Self {
            task,
            units: Mutex::new(units),
            sink,
        }
    }

    /// Record `percent` for `unit` and publish the new composite.
    ///
    /// Returns `None` for units outside the configured set.
    pub fn report(&self, unit: U, percent: u32) -> Option<u32> {
        let percent = percent.min(100);
        let mut units = self.units.lock();
        let Some(slot) = units.get_mut(&unit) else {
            warn!("progress for unknown unit {:?} on task {}", unit, self.task);
            return None;
        };
        *slot = (*slot).max(percent);
        let composite: u32 = units.values().sum();
        // Published under the lock so observers see composites in order.
        self.sink.notify(Notification::CompositeProgress {
            task: self.task.clone(),
            percent: composite,
        });
        Some(composite)
    }

    pub fn composite(&self) -> u32 {
        self.units.lock().values().sum()
    }

    pub fn unit_count(&self) -> usize {
        self.units.lock().len()
    }

    pub fn max_total(&self) -> u32 {
        self.unit_count() as u32 * 100
    }

    pub fn task(&self) -> &TaskKey {
        &self.task
    }
}

/// Counts processed items (e.g. GPX segments) and publishes the running total.
pub struct ItemCounter {
    task: TaskKey,
    total: u32,
    processed: Mutex<u32>,
    sink: Arc<dyn NotificationSink>,
}

impl ItemCounter {
    pub fn new(task: TaskKey, total: u32, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            task,
            total,
            processed: Mutex::new(0),
            sink,
        }
    }

    pub fn increment(&self) -> u32 {
        let mut processed = self.processed.lock();
        *processed += 1;
        self.sink.notify(Notification::CompositeProgress {
            task: self.task.clone(),
            percent: *processed,
        });
        *processed
    }

    pub fn processed(&self) -> u32 {
        *self.processed.lock()
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}
