//! Client interface to a registry.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::lease::Lease;
use crate::tuple::{ServiceTuple, Template};

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Connection-level fault talking to the registry. Recoverable: the
    /// caller invalidates its cached registry and retries later.
    #[error("registry unreachable: {0}")]
    Unreachable(String),
    /// A blocked read was released by its lease being canceled. Expected
    /// during teardown, never a user-visible failure.
    #[error("blocking read canceled by lease")]
    ReadCanceled,
    /// Contract violation. Fatal to any loop observing it.
    #[error("registry fault: {0}")]
    Fault(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Write,
    Delete,
}

/// Change event delivered to a `notify` subscriber.
#[derive(Debug, Clone)]
pub struct RegistryEvent {
    pub kind: EventKind,
    pub tuple: ServiceTuple,
}

/// The four operations every registry supports. Implemented over the
/// network by the registry's own storage engine; implemented in-process by
/// [`crate::MemoryRegistry`].
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Store `tuple`, kept alive according to `lease`'s renewal protocol.
    async fn write(&self, tuple: ServiceTuple, lease: Arc<dyn Lease>) -> Result<()>;

    /// All live tuples matching `template`. Non-blocking.
    async fn read_all(&self, template: &Template) -> Result<Vec<ServiceTuple>>;

    /// One tuple matching `template`. Blocks until a match exists or
    /// `lease` is canceled, failing with [`RegistryError::ReadCanceled`].
    async fn read(&self, template: &Template, lease: Arc<dyn Lease>) -> Result<ServiceTuple>;

    /// Lazy, infinite, non-restartable stream of change events for tuples
    /// matching `template`.
    fn notify(
        &self,
        kind: EventKind,
        template: Template,
    ) -> Result<mpsc::UnboundedReceiver<RegistryEvent>>;
}
