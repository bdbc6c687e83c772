//! Registry search: one-shot and continuous with per-session dedup.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::transport::{BroadcastTransport, RegistryHandle, RegistryIdentity};

/// Default addresses to search: the subnet broadcast address plus loopback.
pub const DEFAULT_BROADCAST_LIST: &[&str] = &["255.255.255.255", "localhost"];

const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Searches for registries over a [`BroadcastTransport`].
#[derive(Clone)]
pub struct RegistryLocator {
    transport: Arc<dyn BroadcastTransport>,
    broadcast_list: Vec<String>,
    round_timeout: Duration,
    poll_interval: Duration,
}

impl RegistryLocator {
    pub fn new(transport: Arc<dyn BroadcastTransport>) -> Self {
        Self::with_broadcast_list(
            transport,
            DEFAULT_BROADCAST_LIST.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn with_broadcast_list(
        transport: Arc<dyn BroadcastTransport>,
        broadcast_list: Vec<String>,
    ) -> Self {
        Self {
            transport,
            broadcast_list,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Delay between broadcast rounds of a continuous search.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn broadcast_list(&self) -> &[String] {
        &self.broadcast_list
    }

    /// One broadcast round, collecting every registry that answers within
    /// `timeout`. Repeat answers with the same identity are folded. May be
    /// empty.
    pub async fn discover_once(&self, timeout: Duration) -> Vec<RegistryHandle> {
        let answers = match self.transport.broadcast(&self.broadcast_list, timeout).await {
            Ok(answers) => answers,
            Err(e) => {
                warn!("broadcast round failed: {e}");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        answers
            .into_iter()
            .filter(|h| seen.insert(h.identity.clone()))
            .collect()
    }

    /// Broadcast repeatedly in the background, invoking `on_found` exactly
    /// once per distinct registry identity ever seen in this session.
    ///
    /// The returned session stops the search when canceled or dropped.
    /// `cancel()` may be invoked from inside `on_found`; no registry seen
    /// after that is reported.
    pub fn discover_continuous<F>(&self, on_found: F) -> DiscoverySession
    where
        F: Fn(RegistryHandle) + Send + Sync + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let locator = self.clone();

        let task = {
            let stop = stop.clone();
            let wake = wake.clone();
            tokio::spawn(async move {
                let mut seen: HashSet<RegistryIdentity> = HashSet::new();
                while !stop.load(Ordering::SeqCst) {
                    match locator
                        .transport
                        .broadcast(&locator.broadcast_list, locator.round_timeout)
                        .await
                    {
                        Ok(answers) => {
                            for handle in answers {
                                if stop.load(Ordering::SeqCst) {
                                    return;
                                }
                                if seen.insert(handle.identity.clone()) {
                                    debug!(registry = %handle.identity, "discovered registry");
                                    on_found(handle);
                                }
                            }
                        }
                        Err(e) => warn!("broadcast round failed: {e}"),
                    }

                    tokio::select! {
                        _ = wake.notified() => {}
                        _ = tokio::time::sleep(locator.poll_interval) => {}
                    }
                }
            })
        };

        DiscoverySession {
            stop,
            wake,
            task: Some(task),
        }
    }
}

/// Cancellation handle for a continuous search.
pub struct DiscoverySession {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl DiscoverySession {
    /// Stop broadcasting and release the search. Idempotent, and safe to
    /// call from inside the `on_found` callback.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_canceled(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Wait for the search task to wind down after a cancel.
    pub async fn stopped(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        self.cancel();
    }
}
