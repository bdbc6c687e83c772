//! In-process registry.
//!
//! Serves unit tests and single-process wiring the same way a networked
//! registry would: entries carry their lease and lapse once the lease
//! answers expire. Writes append; a superseded entry is not touched, it
//! simply lapses on its own lease's schedule.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tracing::debug;

use crate::client::{EventKind, Registry, RegistryError, RegistryEvent, Result};
use crate::lease::{Lease, Renewal};
use crate::tuple::{ServiceTuple, Template};

struct StoredEntry {
    tuple: ServiceTuple,
    lease: Arc<dyn Lease>,
}

struct Watcher {
    kind: EventKind,
    template: Template,
    tx: mpsc::UnboundedSender<RegistryEvent>,
}

#[derive(Default)]
pub struct MemoryRegistry {
    entries: Mutex<Vec<StoredEntry>>,
    watchers: Mutex<Vec<Watcher>>,
    changed: Notify,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of live entries matching `template`.
    pub fn live_count(&self, template: &Template) -> usize {
        self.prune();
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| template.matches(&e.tuple))
            .count()
    }

    /// Drop entries whose lease answered expire, emitting delete events.
    fn prune(&self) {
        let lapsed: Vec<ServiceTuple> = {
            let mut entries = self.entries.lock().unwrap();
            let mut lapsed = Vec::new();
            entries.retain(|e| match e.lease.renew() {
                Renewal::After(_) => true,
                Renewal::Expire => {
                    lapsed.push(e.tuple.clone());
                    false
                }
            });
            lapsed
        };

        for tuple in lapsed {
            debug!(label = %tuple.label, identifier = %tuple.identifier, "entry lapsed");
            self.emit(EventKind::Delete, &tuple);
        }
    }

    fn emit(&self, kind: EventKind, tuple: &ServiceTuple) {
        let mut watchers = self.watchers.lock().unwrap();
        watchers.retain(|w| {
            if w.kind != kind || !w.template.matches(tuple) {
                return !w.tx.is_closed();
            }
            w.tx.send(RegistryEvent {
                kind,
                tuple: tuple.clone(),
            })
            .is_ok()
        });
    }

    fn first_match(&self, template: &Template) -> Option<ServiceTuple> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| template.matches(&e.tuple))
            .map(|e| e.tuple.clone())
    }
}

#[async_trait::async_trait]
impl Registry for MemoryRegistry {
    async fn write(&self, tuple: ServiceTuple, lease: Arc<dyn Lease>) -> Result<()> {
        self.prune();
        debug!(label = %tuple.label, identifier = %tuple.identifier, "write");
        self.entries.lock().unwrap().push(StoredEntry {
            tuple: tuple.clone(),
            lease,
        });
        self.emit(EventKind::Write, &tuple);
        self.changed.notify_waiters();
        Ok(())
    }

    async fn read_all(&self, template: &Template) -> Result<Vec<ServiceTuple>> {
        self.prune();
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| template.matches(&e.tuple))
            .map(|e| e.tuple.clone())
            .collect())
    }

    async fn read(&self, template: &Template, lease: Arc<dyn Lease>) -> Result<ServiceTuple> {
        loop {
            // Register for wakeups before checking, so a write landing
            // between the check and the await is not missed.
            let notified = self.changed.notified();

            self.prune();
            if let Some(tuple) = self.first_match(template) {
                return Ok(tuple);
            }

            // The lease's own answer sets the re-check cadence, exactly as
            // a remote registry would poll it.
            let recheck = match lease.renew() {
                Renewal::Expire => return Err(RegistryError::ReadCanceled),
                Renewal::After(secs) => Duration::from_secs(secs.max(1)),
            };

            let _ = tokio::time::timeout(recheck, notified).await;
        }
    }

    fn notify(
        &self,
        kind: EventKind,
        template: Template,
    ) -> Result<mpsc::UnboundedReceiver<RegistryEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers
            .lock()
            .unwrap()
            .push(Watcher { kind, template, tx });
        Ok(rx)
    }
}
