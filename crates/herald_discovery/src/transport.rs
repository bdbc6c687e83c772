//! Broadcast transport seam and the registry handles it yields.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use herald_registry::Registry;

/// Stable identity of one registry: `(endpoint URI, instance ref)`.
///
/// Two sightings with equal pairs denote the same registry, however many
/// times it is rediscovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryIdentity {
    pub uri: String,
    pub instance: u64,
}

impl RegistryIdentity {
    pub fn new(uri: &str, instance: u64) -> Self {
        Self {
            uri: uri.to_string(),
            instance,
        }
    }
}

impl fmt::Display for RegistryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.uri, self.instance)
    }
}

/// One discovered registry: its identity plus a client to talk to it.
#[derive(Clone)]
pub struct RegistryHandle {
    pub identity: RegistryIdentity,
    pub client: Arc<dyn Registry>,
}

impl RegistryHandle {
    pub fn new(identity: RegistryIdentity, client: Arc<dyn Registry>) -> Self {
        Self { identity, client }
    }
}

impl PartialEq for RegistryHandle {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl fmt::Debug for RegistryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryHandle")
            .field("identity", &self.identity)
            .finish()
    }
}

/// One broadcast round: ask every address in `addrs` and collect the
/// registries that answer within `timeout`. No format guarantees beyond
/// the handles supporting the registry client contract and an identity.
#[async_trait::async_trait]
pub trait BroadcastTransport: Send + Sync {
    async fn broadcast(&self, addrs: &[String], timeout: Duration) -> Result<Vec<RegistryHandle>>;
}

/// Transport that answers with a fixed, known registry set. Covers
/// loopback wiring and deployments where registry addresses are static.
pub struct StaticBroadcast {
    handles: Vec<RegistryHandle>,
}

impl StaticBroadcast {
    pub fn new(handles: Vec<RegistryHandle>) -> Self {
        Self { handles }
    }
}

#[async_trait::async_trait]
impl BroadcastTransport for StaticBroadcast {
    async fn broadcast(&self, _addrs: &[String], _timeout: Duration) -> Result<Vec<RegistryHandle>> {
        Ok(self.handles.clone())
    }
}

/// Mock transport for testing: answers each broadcast round with the next
/// scripted set of handles, then keeps answering the last one.
pub struct MockBroadcast {
    rounds: Mutex<Vec<Vec<RegistryHandle>>>,
    calls: Mutex<u32>,
}

impl MockBroadcast {
    pub fn new() -> Self {
        Self {
            rounds: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        }
    }

    pub fn push_round(&self, handles: Vec<RegistryHandle>) {
        self.rounds.lock().unwrap().push(handles);
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl Default for MockBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BroadcastTransport for MockBroadcast {
    async fn broadcast(&self, _addrs: &[String], _timeout: Duration) -> Result<Vec<RegistryHandle>> {
        *self.calls.lock().unwrap() += 1;
        let mut rounds = self.rounds.lock().unwrap();
        if rounds.len() > 1 {
            Ok(rounds.remove(0))
        } else {
            Ok(rounds.first().cloned().unwrap_or_default())
        }
    }
}
