//! Registry data model and client interface.
//!
//! A registry is a shared, queryable store of labeled service entries
//! reachable over a network. Entries are kept alive by a lease: the
//! registry periodically asks the lease whether to keep the entry, and
//! drops it once the lease answers expire (or stops answering at all).

pub mod client;
pub mod lease;
pub mod memory;
pub mod tuple;

pub use client::{EventKind, Registry, RegistryError, RegistryEvent, Result};
pub use lease::{CancelableLease, Lease, Renewal};
pub use memory::MemoryRegistry;
pub use tuple::{DiscoveredEntry, RemoteRef, ServiceHandle, ServiceTuple, Template, NAME_KIND};
