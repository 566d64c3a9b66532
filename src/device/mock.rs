//! Scriptable in-memory devices for tests and demos.
//!
//! `MockDevice` records every call it receives and serves pre-configured
//! listings, files and routes, so orchestration code can be exercised
//! deterministically without a remote link.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;

use super::traits::{
    CameraKind, DeviceDiscovery, DeviceHandle, DeviceId, ExportProgress, FileOpener, ProgressFn,
    RemoteCommand, RemoteDevice, RemoteEntry, RemoteFile, Route,
};
use crate::error::{Result, ToolkitError};

/// How a mock answers `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockAuth {
    Accept,
    Reject,
    /// Transport failure for the first `n` attempts, then accept.
    Flaky(usize),
    Unreachable,
}

#[derive(Debug)]
pub struct MockDevice {
    id: DeviceId,
    supported: bool,
    auth: MockAuth,
    authenticated: AtomicBool,
    connect_delay: Duration,
    op_delay: Duration,
    working_directory: String,
    cameras: Vec<CameraKind>,
    failing_cameras: HashSet<CameraKind>,
    listings: Mutex<HashMap<String, Vec<RemoteEntry>>>,
    files: Mutex<HashMap<String, Bytes>>,
    routes: Mutex<Vec<Route>>,
    commands: Mutex<Vec<RemoteCommand>>,
    command_result: bool,
    fail_listings: AtomicBool,
    fail_deletes: AtomicBool,
    fail_reads: AtomicBool,
    connect_attempts: AtomicUsize,
    listing_calls: AtomicUsize,
    export_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MockDevice {
    pub fn new(id: &str) -> Self {
        Self {
            id: DeviceId::from(id),
            supported: true,
            auth: MockAuth::Accept,
            authenticated: AtomicBool::new(false),
            connect_delay: Duration::from_millis(5),
            op_delay: Duration::from_millis(5),
            working_directory: "/data/media/0/realdata".to_string(),
            cameras: vec![CameraKind::Front, CameraKind::Wide, CameraKind::Driver],
            failing_cameras: HashSet::new(),
            listings: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
            routes: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            command_result: true,
            fail_listings: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            connect_attempts: AtomicUsize::new(0),
            listing_calls: AtomicUsize::new(0),
            export_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_auth(mut self, auth: MockAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Start out already authenticated, as a device kept from a previous session would.
    pub fn pre_authenticated(self) -> Self {
        self.authenticated.store(true, Ordering::SeqCst);
        self
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }

    pub fn with_working_directory(mut self, root: &str) -> Self {
        self.working_directory = root.to_string();
        self
    }

    pub fn with_cameras(mut self, cameras: &[CameraKind]) -> Self {
        self.cameras = cameras.to_vec();
        self
    }

    pub fn with_failing_camera(mut self, camera: CameraKind) -> Self {
        self.failing_cameras.insert(camera);
        self
    }

    pub fn with_routes(self, routes: Vec<Route>) -> Self {
        *self.routes.lock() = routes;
        self
    }

    /// Register a directory listing; entries are returned in the given order.
    pub fn with_dir(self, path: &str, entries: Vec<RemoteEntry>) -> Self {
        self.listings.lock().insert(path.to_string(), entries);
        self
    }

    pub fn with_file(self, path: &str, content: impl Into<Bytes>) -> Self {
        self.files.lock().insert(path.to_string(), content.into());
        self
    }

    pub fn with_command_result(mut self, success: bool) -> Self {
        self.command_result = success;
        self
    }

    pub fn set_fail_listings(&self, fail: bool) {
        self.fail_listings.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn export_calls(&self) -> usize {
        self.export_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<RemoteCommand> {
        self.commands.lock().clone()
    }

    pub fn remaining_routes(&self) -> Vec<Route> {
        self.routes.lock().clone()
    }

    fn transport(&self, what: &str) -> ToolkitError {
        ToolkitError::Transport(anyhow!("{} failed on {}", what, self.id))
    }
}

/// Shorthand for building listing rows.
pub fn dir_entry(parent: &str, name: &str) -> RemoteEntry {
    RemoteEntry {
        name: name.to_string(),
        full_name: join_remote(parent, name),
        is_directory: true,
        is_symlink: false,
        is_regular_file: false,
    }
}

pub fn file_entry(parent: &str, name: &str) -> RemoteEntry {
    RemoteEntry {
        name: name.to_string(),
        full_name: join_remote(parent, name),
        is_directory: false,
        is_symlink: false,
        is_regular_file: true,
    }
}

fn join_remote(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

#[async_trait]
impl RemoteDevice for MockDevice {
    fn id(&self) -> DeviceId {
        self.id.clone()
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn cameras(&self) -> Vec<CameraKind> {
        self.cameras.clone()
    }

    fn working_directory(&self) -> String {
        self.working_directory.clone()
    }

    async fn connect(&self) -> Result<()> {
        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.connect_delay).await;
        match self.auth {
            MockAuth::Accept => {
                self.authenticated.store(true, Ordering::SeqCst);
                Ok(())
            }
            MockAuth::Reject => Err(ToolkitError::Authentication {
                device: self.id.to_string(),
                reason: "permission denied (publickey)".to_string(),
            }),
            MockAuth::Flaky(failures) if attempt < failures => Err(self.transport("connect")),
            MockAuth::Flaky(_) => {
                self.authenticated.store(true, Ordering::SeqCst);
                Ok(())
            }
            MockAuth::Unreachable => Err(self.transport("connect")),
        }
    }

    async fn enumerate_files(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.op_delay).await;
        if self.fail_listings.load(Ordering::SeqCst) {
            return Err(self.transport("listing"));
        }
        self.listings
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| ToolkitError::Transport(anyhow!("no such directory: {}", path)))
    }

    async fn open_read(&self, path: &str) -> Result<RemoteFile> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.op_delay).await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(self.transport("read"));
        }
        let content = self
            .files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| ToolkitError::Transport(anyhow!("no such file: {}", path)))?;
        Ok(RemoteFile {
            length: content.len() as u64,
            reader: Box::pin(std::io::Cursor::new(content.to_vec())),
        })
    }

    fn routes(&self) -> BoxStream<'_, Result<Route>> {
        let routes = self.routes.lock().clone();
        stream::iter(routes.into_iter().map(Ok)).boxed()
    }

    async fn export_route(
        &self,
        dest_folder: &Path,
        route: &Route,
        camera: CameraKind,
        _combine_segments: bool,
        progress: ProgressFn<ExportProgress>,
    ) -> Result<()> {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_cameras.contains(&camera);
        for percent in [25, 50, 75, 100] {
            tokio::time::sleep(self.op_delay).await;
            if failing && percent > 50 {
                return Err(self.transport("export"));
            }
            progress(ExportProgress { camera, percent });
        }
        tokio::fs::create_dir_all(dest_folder).await?;
        let artifact = dest_folder.join(format!("{}--{}.hevc", route.id, camera));
        tokio::fs::write(artifact, route.id.0.as_bytes()).await?;
        Ok(())
    }

    async fn generate_gpx(&self, route: &Route, progress: ProgressFn<u32>) -> Result<Bytes> {
        for segment in 0..route.segment_count {
            tokio::time::sleep(self.op_delay).await;
            progress(segment);
        }
        Ok(Bytes::from(format!(
            "<gpx version=\"1.1\"><trk><name>{}</name></trk></gpx>",
            route.id
        )))
    }

    async fn delete_route(&self, route: &Route) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.op_delay).await;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(self.transport("delete"));
        }
        self.routes.lock().retain(|r| r.id != route.id);
        Ok(())
    }

    async fn run_command(&self, command: RemoteCommand) -> Result<bool> {
        self.commands.lock().push(command);
        tokio::time::sleep(self.op_delay).await;
        Ok(self.command_result)
    }
}

/// Discovery that replays a fixed candidate list, duplicates included.
#[derive(Debug)]
pub struct MockDiscovery {
    candidates: Vec<DeviceHandle>,
    interval: Duration,
    never_ending: bool,
    passes: AtomicUsize,
}

impl MockDiscovery {
    pub fn new(candidates: Vec<DeviceHandle>) -> Self {
        Self {
            candidates,
            interval: Duration::ZERO,
            never_ending: false,
            passes: AtomicUsize::new(0),
        }
    }

    /// Delay before each candidate is yielded.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Keep the stream open after the last candidate, like a live browse.
    pub fn never_ending(mut self) -> Self {
        self.never_ending = true;
        self
    }

    pub fn passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }
}

impl DeviceDiscovery for MockDiscovery {
    fn discover(&self) -> BoxStream<'static, DeviceHandle> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        let interval = self.interval;
        let emitted = stream::iter(self.candidates.clone()).then(move |device| async move {
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
            device
        });
        if self.never_ending {
            emitted.chain(stream::pending()).boxed()
        } else {
            emitted.boxed()
        }
    }
}

/// Opener that records every path it is asked to open.
#[derive(Debug, Default)]
pub struct RecordingOpener {
    opened: Mutex<Vec<PathBuf>>,
}

impl RecordingOpener {
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().clone()
    }
}

impl FileOpener for RecordingOpener {
    fn open(&self, path: &Path) -> anyhow::Result<()> {
        self.opened.lock().push(path.to_path_buf());
        Ok(())
    }
}
