//! Blocking "wait until a service appears".

use std::sync::Arc;
use std::time::Duration;

use herald_discovery::{RegistryHandle, RegistryLocator};
use herald_registry::{CancelableLease, Lease, RegistryError, ServiceHandle, Template};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Retries a watcher grants its blocked read on connection faults
    /// before retiring. Bounded so a permanently dead registry cannot pin
    /// a watcher forever; the wait itself continues on other registries.
    pub read_retries: u32,
    /// First retry delay; doubles per attempt.
    pub initial_backoff: Duration,
    /// Renewal cadence of the lease guarding the blocked reads.
    pub lease_interval_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            read_retries: 3,
            initial_backoff: Duration::from_secs(1),
            lease_interval_secs: CancelableLease::DEFAULT_INTERVAL_SECS,
        }
    }
}

/// Blocks until some registry holds a matching service entry.
pub struct Waiter {
    locator: RegistryLocator,
    config: WaitConfig,
}

impl Waiter {
    pub fn new(locator: RegistryLocator) -> Self {
        Self::with_config(locator, WaitConfig::default())
    }

    pub fn with_config(locator: RegistryLocator, config: WaitConfig) -> Self {
        Self { locator, config }
    }

    /// Wait until any registry (including ones discovered after this call
    /// starts) holds an entry for `label`, and return its handle.
    ///
    /// One watcher per discovered registry holds a blocking read open,
    /// guarded by a shared lease; the first read to complete wins and
    /// later results are discarded. The lease and the discovery session
    /// are canceled on the way out even if this future is dropped, so no
    /// blocked read leaks against a registry.
    pub async fn wait_for(&self, label: &str) -> ServiceHandle {
        let (tx, mut rx) = mpsc::channel::<ServiceHandle>(1);
        let lease = Arc::new(CancelableLease::with_interval(self.config.lease_interval_secs));
        let template = Template::service(label);
        let config = self.config.clone();

        let session = self.locator.discover_continuous({
            let tx = tx.clone();
            let lease = lease.clone();
            move |registry| {
                debug!(registry = %registry.identity, "watching registry");
                tokio::spawn(watch_registry(
                    registry,
                    template.clone(),
                    lease.clone(),
                    tx.clone(),
                    config.clone(),
                ));
            }
        });

        let _teardown = Teardown {
            lease,
            session,
        };

        // `tx` is still held here, so the channel cannot close before a
        // watcher delivers.
        match rx.recv().await {
            Some(handle) => handle,
            None => unreachable!("result channel closed while a sender is held"),
        }
    }
}

struct Teardown {
    lease: Arc<CancelableLease>,
    session: herald_discovery::DiscoverySession,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.lease.cancel();
        self.session.cancel();
    }
}

async fn watch_registry(
    registry: RegistryHandle,
    template: Template,
    lease: Arc<CancelableLease>,
    tx: mpsc::Sender<ServiceHandle>,
    config: WaitConfig,
) {
    let mut backoff = config.initial_backoff;
    let mut attempts = 0u32;

    loop {
        match registry
            .client
            .read(&template, lease.clone() as Arc<dyn Lease>)
            .await
        {
            Ok(tuple) => {
                // Single-slot funnel: the first watcher wins, later results
                // are discarded.
                let _ = tx.try_send(tuple.handle);
                return;
            }
            Err(RegistryError::ReadCanceled) => return,
            Err(RegistryError::Unreachable(e)) => {
                attempts += 1;
                if attempts > config.read_retries {
                    warn!(
                        registry = %registry.identity,
                        "watcher retiring after {attempts} failed reads: {e}"
                    );
                    return;
                }
                debug!(
                    registry = %registry.identity,
                    "blocked read failed: {e}; retrying in {backoff:?}"
                );
                tokio::time::sleep(backoff).await;
                if lease.is_canceled() {
                    return;
                }
                backoff *= 2;
            }
            Err(e) => {
                warn!(registry = %registry.identity, "watcher failed: {e}");
                return;
            }
        }
    }
}
