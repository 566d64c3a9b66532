use std::fmt;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use crate::error::Result;

/// Stable identity of a device (network address or serial).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        DeviceId(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CameraKind {
    Front,
    Wide,
    Driver,
}

impl fmt::Display for CameraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CameraKind::Front => "front",
            CameraKind::Wide => "wide",
            CameraKind::Driver => "driver",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub String);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recorded drive, made of fixed-length segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub id: RouteId,
    pub segment_count: u32,
}

impl Route {
    pub fn new(id: &str, segment_count: u32) -> Self {
        Self {
            id: RouteId(id.to_string()),
            segment_count,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// One row of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    /// Absolute remote path.
    pub full_name: String,
    pub is_directory: bool,
    pub is_symlink: bool,
    pub is_regular_file: bool,
}

impl RemoteEntry {
    /// Entries that navigate rather than download: plain directories and symlinks.
    pub fn is_navigable(&self) -> bool {
        (self.is_directory && !self.is_regular_file) || self.is_symlink
    }
}

/// Progress of one camera's export, 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress {
    pub camera: CameraKind,
    pub percent: u32,
}

/// Callback handed to long remote operations.
pub type ProgressFn<T> = Arc<dyn Fn(T) + Send + Sync>;

/// An open remote file: a byte stream of known length.
pub struct RemoteFile {
    pub length: u64,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Maintenance commands executed over the remote shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
    Reboot,
    Shutdown,
    FlashPanda,
    InstallEmu,
    Reinstall,
    OpenSettings,
    CloseSettings,
}

/// Consumed capability of one reachable device.
///
/// Implementations own the wire protocol. Errors must distinguish
/// [`ToolkitError::Authentication`](crate::error::ToolkitError::Authentication)
/// from transport failures so scans can keep going past rejected credentials.
#[async_trait]
pub trait RemoteDevice: Send + Sync + fmt::Debug {
    fn id(&self) -> DeviceId;

    /// Unrecognised hardware is reported by discovery but never connected.
    fn is_supported(&self) -> bool {
        true
    }

    fn is_authenticated(&self) -> bool;

    fn cameras(&self) -> Vec<CameraKind>;

    /// Root directory the remote browser starts in.
    fn working_directory(&self) -> String;

    async fn connect(&self) -> Result<()>;

    async fn enumerate_files(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    async fn open_read(&self, path: &str) -> Result<RemoteFile>;

    fn routes(&self) -> BoxStream<'_, Result<Route>>;

    async fn export_route(
        &self,
        dest_folder: &Path,
        route: &Route,
        camera: CameraKind,
        combine_segments: bool,
        progress: ProgressFn<ExportProgress>,
    ) -> Result<()>;

    /// Returns the serialized GPX document; `progress` receives each processed segment index.
    async fn generate_gpx(&self, route: &Route, progress: ProgressFn<u32>) -> Result<Bytes>;

    async fn delete_route(&self, route: &Route) -> Result<()>;

    async fn run_command(&self, command: RemoteCommand) -> Result<bool>;
}

pub type DeviceHandle = Arc<dyn RemoteDevice>;

/// Source of device candidates. The stream may repeat a device and may never end;
/// callers bound it with a timeout.
pub trait DeviceDiscovery: Send + Sync {
    fn discover(&self) -> BoxStream<'static, DeviceHandle>;
}

/// Hands a materialised file to the platform's default handler.
pub trait FileOpener: Send + Sync {
    fn open(&self, path: &Path) -> anyhow::Result<()>;
}

/// Opener that only logs; used when no presentation layer is attached.
#[derive(Debug, Default)]
pub struct LogOpener;

impl FileOpener for LogOpener {
    fn open(&self, path: &Path) -> anyhow::Result<()> {
        tracing::info!("materialized file ready path={}", path.display());
        Ok(())
    }
}
