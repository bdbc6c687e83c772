//! Registration agent and its monitor loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use herald_discovery::{RegistryHandle, RegistryLocator};
use herald_registry::{
    CancelableLease, Lease, RegistryError, ServiceHandle, ServiceTuple, Template,
};
use thiserror::Error;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How often the monitor loop re-checks the registration.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 15;

/// Renewal cadence of a registration's lease.
pub const REGISTRATION_RENEW_SECS: u64 = 180;

/// Bound on resolving one live registry through discovery.
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AgentError {
    /// No registry answered discovery within the bound. Recoverable; the
    /// monitor loop retries on its next tick.
    #[error("no registry answered discovery")]
    RegistryNotFound,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("registration loop failed: {0}")]
    Fatal(String),
}

/// Whether [`RegistrationAgent::run`] returns immediately or blocks until
/// the first successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitMode {
    #[default]
    None,
    FirstRegister,
}

/// Advertises one service handle and keeps the advertisement alive.
pub struct RegistrationAgent {
    label: String,
    identifier: String,
    handle: ServiceHandle,
    check_interval: Duration,
    locator: RegistryLocator,
    // Cached resolution. Single owner: only this agent reads or writes the
    // slot, and after `run()` that means the monitor loop task alone.
    registry: Option<RegistryHandle>,
    lease: Arc<CancelableLease>,
}

impl RegistrationAgent {
    pub fn new(handle: ServiceHandle, label: &str, locator: RegistryLocator) -> Self {
        Self::with_name(handle, label, None, locator)
    }

    /// `name`, when given, suffixes the identifier to distinguish several
    /// agents registering the same label from one process.
    pub fn with_name(
        handle: ServiceHandle,
        label: &str,
        name: Option<&str>,
        locator: RegistryLocator,
    ) -> Self {
        Self {
            label: label.to_string(),
            identifier: default_identifier(name),
            handle,
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            locator,
            registry: None,
            lease: Arc::new(CancelableLease::with_interval(REGISTRATION_RENEW_SECS)),
        }
    }

    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The lease guarding the most recent registration.
    pub fn current_lease(&self) -> Arc<CancelableLease> {
        self.lease.clone()
    }

    /// Inject a known registry, bypassing discovery.
    pub fn set_registry(&mut self, registry: RegistryHandle) {
        self.registry = Some(registry);
    }

    pub fn cached_registry(&self) -> Option<&RegistryHandle> {
        self.registry.as_ref()
    }

    fn invalidate_registry(&mut self) {
        self.registry = None;
    }

    /// Cached registry if held, else a bounded discovery lookup for exactly
    /// one live registry.
    async fn resolve_registry(&mut self) -> Result<RegistryHandle, AgentError> {
        if let Some(registry) = &self.registry {
            return Ok(registry.clone());
        }

        let found = self.locator.discover_once(RESOLVE_TIMEOUT).await;
        match found.into_iter().next() {
            Some(registry) => {
                debug!(registry = %registry.identity, "resolved registry");
                self.registry = Some(registry.clone());
                Ok(registry)
            }
            None => Err(AgentError::RegistryNotFound),
        }
    }

    /// Write one registration tuple plus a fresh lease to the resolved
    /// registry.
    ///
    /// The previous lease is replaced but not canceled; the superseded
    /// entry lapses on the registry's own renewal schedule.
    pub async fn register(&mut self) -> Result<(), AgentError> {
        let registry = self.resolve_registry().await?;
        let lease = Arc::new(CancelableLease::with_interval(REGISTRATION_RENEW_SECS));
        let tuple = ServiceTuple::new(&self.label, self.handle.clone(), &self.identifier);

        match registry
            .client
            .write(tuple, lease.clone() as Arc<dyn Lease>)
            .await
        {
            Ok(()) => {
                info!(label = %self.label, identifier = %self.identifier, "registered");
                self.lease = lease;
                Ok(())
            }
            Err(e @ RegistryError::Unreachable(_)) => {
                self.invalidate_registry();
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the resolved registry currently holds our registration.
    ///
    /// A connection fault answers `false` and invalidates the cached
    /// registry so the next call re-resolves; so does an unresolvable
    /// registry. Only a contract violation is an error.
    pub async fn is_registered(&mut self) -> Result<bool, AgentError> {
        let registry = match self.resolve_registry().await {
            Ok(registry) => registry,
            Err(AgentError::RegistryNotFound) => return Ok(false),
            Err(e) => return Err(e),
        };

        let template = Template::registration(&self.label, &self.identifier);
        match registry.client.read_all(&template).await {
            Ok(entries) => Ok(entries.iter().any(|t| t.handle == self.handle)),
            Err(RegistryError::Unreachable(e)) => {
                debug!("registry unreachable while checking registration: {e}");
                self.invalidate_registry();
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_registered(&mut self) -> Result<(), AgentError> {
        // One resolution per tick: a tick that finds no registry stops here
        // instead of re-discovering again for the write.
        self.resolve_registry().await?;
        if self.is_registered().await? {
            return Ok(());
        }
        self.register().await
    }

    /// Spawn the monitor loop: every check interval, re-register unless
    /// still registered.
    ///
    /// Transient conditions (`RegistryNotFound`, `Unreachable`) are
    /// swallowed and retried next tick; anything else terminates the loop
    /// and surfaces through [`AgentHandle::join`]. With
    /// [`WaitMode::FirstRegister`] this call does not return until the
    /// first tick that completes registration without error.
    pub async fn run(mut self, wait: WaitMode) -> AgentHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let (first_tx, first_rx) = oneshot::channel::<()>();
        let mut first_tx = Some(first_tx);

        let task = {
            let stop = stop.clone();
            let wake = wake.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(self.check_interval);
                loop {
                    tokio::select! {
                        _ = wake.notified() => {}
                        _ = ticker.tick() => {}
                    }
                    if stop.load(Ordering::SeqCst) {
                        debug!(identifier = %self.identifier, "agent stopped");
                        return Ok(());
                    }

                    match self.ensure_registered().await {
                        Ok(()) => {
                            if let Some(tx) = first_tx.take() {
                                let _ = tx.send(());
                            }
                        }
                        Err(AgentError::RegistryNotFound) => {
                            debug!("no registry found; retrying next tick");
                        }
                        Err(AgentError::Registry(RegistryError::Unreachable(e))) => {
                            debug!("registry unreachable: {e}; retrying next tick");
                        }
                        Err(e) => {
                            warn!("registration loop failed: {e}");
                            return Err(e);
                        }
                    }
                }
            })
        };

        if wait == WaitMode::FirstRegister {
            // A failed receive means the loop died before registering; the
            // error is waiting in `join()`.
            let _ = first_rx.await;
        }

        AgentHandle { stop, wake, task }
    }
}

/// Running monitor loop. `stop()` is prompt and idempotent; the loop
/// initiates no further registry calls once it observes the flag.
pub struct AgentHandle {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<Result<(), AgentError>>,
}

impl AgentHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Wait for the loop to exit, yielding the fatal error if one ended it.
    pub async fn join(self) -> Result<(), AgentError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(AgentError::Fatal(e.to_string())),
        }
    }
}

/// `<lowercased host>_<pid>`, optionally suffixed `_<name>`.
fn default_identifier(name: Option<&str>) -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".into())
        .to_lowercase();

    match name {
        Some(name) => format!("{host}_{}_{name}", std::process::id()),
        None => format!("{host}_{}", std::process::id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_discovery::{MockBroadcast, RegistryIdentity, StaticBroadcast};
    use herald_registry::{MemoryRegistry, Registry};

    fn memory_registry() -> (Arc<MemoryRegistry>, RegistryHandle) {
        let registry = Arc::new(MemoryRegistry::new());
        let handle = RegistryHandle::new(
            RegistryIdentity::new("mem://test", 1),
            registry.clone() as Arc<dyn Registry>,
        );
        (registry, handle)
    }

    fn empty_locator() -> RegistryLocator {
        RegistryLocator::new(Arc::new(MockBroadcast::new()))
    }

    fn agent_with_registry() -> (RegistrationAgent, Arc<MemoryRegistry>) {
        let (registry, handle) = memory_registry();
        let mut agent = RegistrationAgent::new(
            ServiceHandle::remote("tcp://127.0.0.1:9000", 42),
            "echo",
            empty_locator(),
        );
        agent.set_registry(handle);
        (agent, registry)
    }

    #[test]
    fn identifier_defaults_to_host_and_pid() {
        let agent = RegistrationAgent::new(
            ServiceHandle::local("x"),
            "echo",
            empty_locator(),
        );
        let pid = std::process::id().to_string();
        assert!(agent.identifier().ends_with(&pid));

        let named = RegistrationAgent::with_name(
            ServiceHandle::local("x"),
            "echo",
            Some("blue"),
            empty_locator(),
        );
        assert!(named.identifier().ends_with(&format!("{pid}_blue")));
    }

    #[tokio::test]
    async fn register_writes_exactly_one_matching_entry() {
        let (registry, mut agent) = {
            let (r, h) = memory_registry();
            let mut a = RegistrationAgent::new(
                ServiceHandle::remote("tcp://127.0.0.1:9000", 42),
                "echo",
                empty_locator(),
            );
            a.set_registry(h);
            (r, a)
        };

        agent.register().await.unwrap();

        let template = Template::registration("echo", agent.identifier());
        let entries = registry.read_all(&template).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].handle,
            ServiceHandle::remote("tcp://127.0.0.1:9000", 42)
        );
    }

    #[tokio::test]
    async fn is_registered_reflects_registry_contents() {
        let (mut agent, _registry) = agent_with_registry();

        assert!(!agent.is_registered().await.unwrap());
        agent.register().await.unwrap();
        assert!(agent.is_registered().await.unwrap());
    }

    #[tokio::test]
    async fn another_registrant_with_same_identifier_does_not_count() {
        let (mut agent, registry) = agent_with_registry();

        // Same label and identifier, different handle: someone else's
        // registration, not ours.
        let foreign = ServiceTuple::new(
            "echo",
            ServiceHandle::remote("tcp://10.9.9.9:1", 7),
            agent.identifier(),
        );
        registry
            .write(foreign, Arc::new(CancelableLease::new()))
            .await
            .unwrap();

        assert!(!agent.is_registered().await.unwrap());
    }

    #[tokio::test]
    async fn superseded_registration_lapses_to_one_entry() {
        let (mut agent, registry) = agent_with_registry();

        agent.register().await.unwrap();
        let first = agent.current_lease();
        agent.register().await.unwrap();

        // Both entries visible until the superseded lease lapses: a known,
        // bounded staleness window.
        let template = Template::registration("echo", agent.identifier());
        assert_eq!(registry.live_count(&template), 2);

        first.cancel();
        let entries = registry.read_all(&template).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].handle,
            ServiceHandle::remote("tcp://127.0.0.1:9000", 42)
        );
    }

    #[tokio::test]
    async fn register_without_any_registry_is_not_found() {
        let mut agent = RegistrationAgent::new(
            ServiceHandle::local("x"),
            "echo",
            empty_locator(),
        );
        assert!(matches!(
            agent.register().await,
            Err(AgentError::RegistryNotFound)
        ));
        assert!(!agent.is_registered().await.unwrap());
    }

    #[tokio::test]
    async fn resolves_registry_through_discovery() {
        let (registry, handle) = memory_registry();
        let transport = Arc::new(StaticBroadcast::new(vec![handle]));
        let mut agent = RegistrationAgent::new(
            ServiceHandle::local("x"),
            "echo",
            RegistryLocator::new(transport),
        );

        agent.register().await.unwrap();
        assert!(agent.cached_registry().is_some());
        assert_eq!(registry.live_count(&Template::service("echo")), 1);
    }

    struct UnreachableRegistry;

    #[async_trait::async_trait]
    impl Registry for UnreachableRegistry {
        async fn write(
            &self,
            _tuple: ServiceTuple,
            _lease: Arc<dyn Lease>,
        ) -> herald_registry::Result<()> {
            Err(RegistryError::Unreachable("connection refused".into()))
        }

        async fn read_all(
            &self,
            _template: &Template,
        ) -> herald_registry::Result<Vec<ServiceTuple>> {
            Err(RegistryError::Unreachable("connection refused".into()))
        }

        async fn read(
            &self,
            _template: &Template,
            _lease: Arc<dyn Lease>,
        ) -> herald_registry::Result<ServiceTuple> {
            Err(RegistryError::Unreachable("connection refused".into()))
        }

        fn notify(
            &self,
            _kind: herald_registry::EventKind,
            _template: Template,
        ) -> herald_registry::Result<
            tokio::sync::mpsc::UnboundedReceiver<herald_registry::RegistryEvent>,
        > {
            Err(RegistryError::Unreachable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn connection_fault_answers_false_and_clears_cache() {
        let mut agent = RegistrationAgent::new(
            ServiceHandle::local("x"),
            "echo",
            empty_locator(),
        );
        agent.set_registry(RegistryHandle::new(
            RegistryIdentity::new("mem://dead", 9),
            Arc::new(UnreachableRegistry),
        ));

        assert!(!agent.is_registered().await.unwrap());
        assert!(agent.cached_registry().is_none());
    }

    #[tokio::test]
    async fn register_against_unreachable_registry_clears_cache() {
        let mut agent = RegistrationAgent::new(
            ServiceHandle::local("x"),
            "echo",
            empty_locator(),
        );
        agent.set_registry(RegistryHandle::new(
            RegistryIdentity::new("mem://dead", 9),
            Arc::new(UnreachableRegistry),
        ));

        assert!(matches!(
            agent.register().await,
            Err(AgentError::Registry(RegistryError::Unreachable(_)))
        ));
        assert!(agent.cached_registry().is_none());
    }
}
