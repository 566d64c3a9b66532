// Download de-dup cache: per-destination state machine for materialised remote files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::debug;

/// State of one destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// A download is running; no result yet.
    InFlight,
    /// Last successful download and the file's modification time.
    Completed(SystemTime),
    /// The only download attempted so far failed. Acquired like an absent path.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The caller owns the download. `previous` is restored if it fails.
    Proceed { previous: Option<SystemTime> },
    /// Another caller is already downloading this path.
    Coalesce,
}

/// Session-scoped log of downloads keyed by local destination.
///
/// Re-acquiring a completed path always proceeds: reopening a file
/// re-downloads it rather than serving the earlier copy.
#[derive(Debug, Default)]
pub struct WatchedFiles {
    entries: Mutex<HashMap<PathBuf, WatchState>>,
}

impl WatchedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, path: &Path) -> Acquire {
        let mut entries = self.entries.lock();
        match entries.get(path).copied() {
            None | Some(WatchState::Failed) => {
                entries.insert(path.to_path_buf(), WatchState::InFlight);
                Acquire::Proceed { previous: None }
            }
            Some(WatchState::InFlight) => {
                debug!("download already in flight path={}", path.display());
                Acquire::Coalesce
            }
            Some(WatchState::Completed(at)) => {
                entries.insert(path.to_path_buf(), WatchState::InFlight);
                Acquire::Proceed { previous: Some(at) }
            }
        }
    }

    /// Mark a download finished with the artifact's modification time.
    pub fn complete(&self, path: &Path, modified: SystemTime) {
        self.entries
            .lock()
            .insert(path.to_path_buf(), WatchState::Completed(modified));
    }

    /// Roll back a failed download so the path can be acquired again.
    ///
    /// The entry stays in the log: it reverts to its last completion, or
    /// becomes [`WatchState::Failed`] if there was none.
    pub fn abandon(&self, path: &Path, previous: Option<SystemTime>) {
        let state = match previous {
            Some(at) => WatchState::Completed(at),
            None => WatchState::Failed,
        };
        self.entries.lock().insert(path.to_path_buf(), state);
    }

    pub fn state(&self, path: &Path) -> Option<WatchState> {
        self.entries.lock().get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
