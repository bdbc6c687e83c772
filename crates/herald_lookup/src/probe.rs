//! Liveness probing of remote references.

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::Result;
use herald_registry::RemoteRef;

/// A minimal round-trip against a remote reference. Any failure, timeout
/// and unsupported call included, means the reference is treated as stale.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn ping(&self, target: &RemoteRef) -> Result<()>;
}

/// Mock prober for testing: answers from a fixed set of live references.
#[derive(Default)]
pub struct MockProber {
    live: Mutex<HashSet<RemoteRef>>,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_live(&self, target: RemoteRef) {
        self.live.lock().unwrap().insert(target);
    }

    pub fn mark_stale(&self, target: &RemoteRef) {
        self.live.lock().unwrap().remove(target);
    }
}

#[async_trait::async_trait]
impl Prober for MockProber {
    async fn ping(&self, target: &RemoteRef) -> Result<()> {
        if self.live.lock().unwrap().contains(target) {
            Ok(())
        } else {
            anyhow::bail!("no answer from {}", target.endpoint)
        }
    }
}
