//! Broadcast discovery of registries.
//!
//! The transport that actually carries a broadcast is an external
//! collaborator behind [`BroadcastTransport`]; this crate owns the search
//! itself: one-shot enumeration and a continuous background search that
//! reports each distinct registry exactly once per session.

pub mod locator;
pub mod transport;

pub use locator::{DiscoverySession, RegistryLocator, DEFAULT_BROADCAST_LIST};
pub use transport::{
    BroadcastTransport, MockBroadcast, RegistryHandle, RegistryIdentity, StaticBroadcast,
};
