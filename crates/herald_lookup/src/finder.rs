//! One-shot service lookup.

use std::sync::Arc;
use std::time::Duration;

use herald_discovery::{RegistryHandle, RegistryLocator};
use herald_registry::{DiscoveredEntry, ServiceHandle, Template};
use thiserror::Error;
use tracing::debug;

use crate::probe::Prober;

const DEFAULT_DISCOVER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no live service {0:?} found on any registry")]
    ServiceNotFound(String),
}

/// Finds the first live service matching a label on any registry.
pub struct Finder {
    locator: RegistryLocator,
    prober: Arc<dyn Prober>,
    discover_timeout: Duration,
}

impl Finder {
    pub fn new(locator: RegistryLocator, prober: Arc<dyn Prober>) -> Self {
        Self {
            locator,
            prober,
            discover_timeout: DEFAULT_DISCOVER_TIMEOUT,
        }
    }

    pub fn discover_timeout(mut self, timeout: Duration) -> Self {
        self.discover_timeout = timeout;
        self
    }

    /// One discovery pass, then the first entry for `label` whose handle
    /// answers a liveness probe (local values need none). Does not wait for
    /// services that do not yet exist.
    pub async fn find(&self, label: &str) -> Result<DiscoveredEntry, LookupError> {
        let registries = self.locator.discover_once(self.discover_timeout).await;
        self.find_in(&registries, label).await
    }

    /// Same scan over an already-known registry set, in the given order.
    pub async fn find_in(
        &self,
        registries: &[RegistryHandle],
        label: &str,
    ) -> Result<DiscoveredEntry, LookupError> {
        for registry in registries {
            let tuples = match registry.client.read_all(&Template::any_service()).await {
                Ok(tuples) => tuples,
                Err(e) => {
                    debug!(registry = %registry.identity, "skipping registry: {e}");
                    continue;
                }
            };

            for tuple in tuples {
                if tuple.label != label {
                    continue;
                }
                match &tuple.handle {
                    ServiceHandle::Local(_) => return Ok(tuple.into()),
                    ServiceHandle::Remote(remote) => match self.prober.ping(remote).await {
                        Ok(()) => return Ok(tuple.into()),
                        Err(e) => {
                            debug!(endpoint = %remote.endpoint, "candidate failed probe: {e}");
                        }
                    },
                }
            }
        }

        Err(LookupError::ServiceNotFound(label.to_string()))
    }
}
