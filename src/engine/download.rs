// Browsed-file download: streams a remote file to local staging, de-duplicated per destination.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::notify::{Notification, NotificationSink};
use super::watched::{Acquire, WatchedFiles};
use crate::device::traits::{DeviceHandle, FileOpener, RemoteEntry, RemoteFile};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Materialized { path: PathBuf, modified: SystemTime },
    /// A download of the same destination was already running.
    Coalesced(PathBuf),
}

pub struct FileDownloader {
    root: PathBuf,
    chunk_size: usize,
    watched: WatchedFiles,
    sink: Arc<dyn NotificationSink>,
    opener: Arc<dyn FileOpener>,
}

impl FileDownloader {
    pub fn new(
        root: impl Into<PathBuf>,
        chunk_size: usize,
        sink: Arc<dyn NotificationSink>,
        opener: Arc<dyn FileOpener>,
    ) -> Self {
        Self {
            root: root.into(),
            chunk_size: chunk_size.max(1),
            watched: WatchedFiles::new(),
            sink,
            opener,
        }
    }

    pub fn watched(&self) -> &WatchedFiles {
        &self.watched
    }

    /// Local destination for a remote absolute path. `.` and `..` segments are dropped.
    pub fn local_path(&self, remote_path: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in remote_path
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        {
            path.push(segment);
        }
        path
    }

    /// Download `entry` and hand it to the opener. Always re-downloads a previously completed file.
    pub async fn download(&self, device: &DeviceHandle, entry: &RemoteEntry) -> Result<DownloadOutcome> {
        let path = self.local_path(&entry.full_name);
        let previous = match self.watched.acquire(&path) {
            Acquire::Coalesce => return Ok(DownloadOutcome::Coalesced(path)),
            Acquire::Proceed { previous } => previous,
        };

        match self.materialize(device, &entry.full_name, &path).await {
            Ok(modified) => {
                self.watched.complete(&path, modified);
                info!("downloaded {} to {}", entry.full_name, path.display());
                if let Err(e) = self.opener.open(&path) {
                    warn!("could not open {}: {}", path.display(), e);
                }
                Ok(DownloadOutcome::Materialized { path, modified })
            }
            Err(e) => {
                warn!("download of {} failed: {}", entry.full_name, e);
                self.watched.abandon(&path, previous);
                Err(e)
            }
        }
    }

    async fn materialize(&self, device: &DeviceHandle, remote: &str, local: &Path) -> Result<SystemTime> {
        let mut source = device.open_read(remote).await?;
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // The previous copy stays in place until the new body is complete.
        let staging = staging_path(local);
        let copied = self.copy_to(&mut source, &staging, local).await;
        let total = match copied {
            Ok(total) => total,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                    debug!("could not remove {}: {}", staging.display(), cleanup);
                }
                return Err(e);
            }
        };
        tokio::fs::rename(&staging, local).await?;
        debug!("wrote {} bytes to {}", total, local.display());

        let modified = tokio::fs::metadata(local).await?.modified()?;
        Ok(modified)
    }

    async fn copy_to(&self, source: &mut RemoteFile, staging: &Path, local: &Path) -> Result<u64> {
        let mut output = tokio::fs::File::create(staging).await?;
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total = 0u64;
        let mut last_percent = 0u32;
        loop {
            let read = source.reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            output.write_all(&buffer[..read]).await?;
            total += read as u64;

            let percent = percent_of(total, source.length);
            if percent != last_percent {
                self.sink.notify(Notification::DownloadProgress {
                    path: local.to_path_buf(),
                    percent,
                });
                last_percent = percent;
            }
        }
        output.flush().await?;
        Ok(total)
    }
}

fn staging_path(local: &Path) -> PathBuf {
    let mut name = local.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    local.with_file_name(name)
}

fn percent_of(done: u64, total: u64) -> u32 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::traits::LogOpener;
    use crate::engine::notify::NullSink;

    #[test]
    fn test_local_path_strips_root_and_traversal() {
        let downloader = FileDownloader::new("/tmp/explorer", 16, Arc::new(NullSink), Arc::new(LogOpener));
        assert_eq!(
            downloader.local_path("/data/params/d/DongleId"),
            PathBuf::from("/tmp/explorer/data/params/d/DongleId")
        );
        assert_eq!(
            downloader.local_path("/../etc/./passwd"),
            PathBuf::from("/tmp/explorer/etc/passwd")
        );
    }

    #[test]
    fn test_staging_path_is_a_sibling() {
        assert_eq!(
            staging_path(Path::new("/tmp/explorer/data/boot.log")),
            PathBuf::from("/tmp/explorer/data/boot.log.part")
        );
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 200), 0);
        assert_eq!(percent_of(50, 200), 25);
        assert_eq!(percent_of(300, 200), 100);
        assert_eq!(percent_of(0, 0), 100);
    }
}
