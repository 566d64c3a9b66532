use serde::Deserialize;

use crate::engine::retry::RetryPolicy;

/// Buffer size used when streaming a remote file to local disk (80 KB).
pub const DOWNLOAD_CHUNK_SIZE: usize = 81_920;

/// Seconds between automatic rescans.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 5;

/// Upper bound on how long a discovery pass may keep reading candidates.
pub const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 10;

/// Shown when discovery produced no candidates at all.
pub const NO_DEVICES_MESSAGE: &str = "No devices were found, please check that SSH is enabled on your device and the device is connected to the network.";

/// Top-level configuration for the orchestration engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Discovery stream is abandoned after this many milliseconds.
    pub discovery_timeout_ms: u64,
    /// Interval of the periodic rescan timer.
    pub scan_interval_ms: u64,
    /// Maximum number of devices authenticated concurrently during a scan.
    pub max_connect_concurrency: usize,
    /// Backoff applied to transient transport failures.
    pub connect_retry: RetryPolicy,
    /// Local staging directory for files opened from the remote browser.
    pub download_dir: String,
    /// Size of each read when materialising a remote file.
    pub download_chunk_size: usize,
    /// How long a superseded stream consumer has to release its resources.
    pub stream_release_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: DEFAULT_DISCOVERY_TIMEOUT_SECS * 1000,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_SECS * 1000,
            max_connect_concurrency: 4,
            connect_retry: RetryPolicy::default(),
            download_dir: "tmp/explorer".to_string(),
            download_chunk_size: DOWNLOAD_CHUNK_SIZE,
            stream_release_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    /// Clamp values that would otherwise stall the engine.
    pub fn normalized(mut self) -> Self {
        self.max_connect_concurrency = self.max_connect_concurrency.max(1);
        self.download_chunk_size = self.download_chunk_size.max(1);
        self
    }
}
