// Exclusive stream ownership: one active media stream, replaced only after the previous owner lets go.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct ActiveStream {
    generation: u64,
    token: CancellationToken,
    released: oneshot::Receiver<()>,
}

/// Handle held by the consumer of the active stream.
///
/// The consumer must watch [`StreamLease::cancelled`] and drop the lease once
/// its resources are released; dropping is the acknowledgement.
#[derive(Debug)]
pub struct StreamLease {
    generation: u64,
    token: CancellationToken,
    _release: oneshot::Sender<()>,
}

impl StreamLease {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a newer stream has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Child token for work spawned on behalf of this stream.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

/// Serialises replacement of the single active stream.
pub struct StreamTokens {
    current: Mutex<Option<ActiveStream>>,
    next_generation: AtomicU64,
    release_timeout: Duration,
}

impl StreamTokens {
    pub fn new(release_timeout: Duration) -> Self {
        Self {
            current: Mutex::new(None),
            next_generation: AtomicU64::new(1),
            release_timeout,
        }
    }

    /// Cancel the active stream, wait for its owner to release it, then install a new one.
    ///
    /// The whole exchange happens under one lock, so concurrent callers are
    /// ordered and only the last one holds the live lease.
    pub async fn supersede(&self) -> StreamLease {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            self.release(previous).await;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let (release_tx, release_rx) = oneshot::channel();
        *current = Some(ActiveStream {
            generation,
            token: token.clone(),
            released: release_rx,
        });
        debug!("stream generation {} active", generation);

        StreamLease {
            generation,
            token,
            _release: release_tx,
        }
    }

    /// Cancel the active stream without starting another.
    pub async fn revoke(&self) {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            self.release(previous).await;
        }
    }

    /// Generation of the active stream, if any.
    pub async fn active_generation(&self) -> Option<u64> {
        self.current.lock().await.as_ref().map(|s| s.generation)
    }

    async fn release(&self, previous: ActiveStream) {
        previous.token.cancel();
        // Either an explicit send or the sender being dropped counts as released.
        match tokio::time::timeout(self.release_timeout, previous.released).await {
            Ok(_) => debug!("stream generation {} released", previous.generation),
            Err(_) => warn!(
                "stream generation {} did not release within {}ms, replacing anyway",
                previous.generation,
                self.release_timeout.as_millis()
            ),
        }
    }
}
