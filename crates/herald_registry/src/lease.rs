//! Lease renewal protocol.
//!
//! A lease is handed to the registry together with a tuple (or a blocked
//! read). The registry asks it `renew()` on its own schedule; the answer is
//! either "keep going, ask again in N seconds" or "expire now". Nothing
//! else runs on the holder's side after the lease is transmitted.

use std::sync::atomic::{AtomicBool, Ordering};

/// Answer to a registry's renewal query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renewal {
    /// Keep the entry and ask again after this many seconds.
    After(u64),
    /// Drop the entry immediately.
    Expire,
}

pub trait Lease: Send + Sync {
    fn renew(&self) -> Renewal;
}

/// Lease that renews at a fixed interval until canceled.
///
/// `cancel()` is idempotent and safe to call concurrently with an in-flight
/// `renew()`; the cancellation becomes visible to the next `renew()` call.
/// A canceled lease never reactivates.
#[derive(Debug)]
pub struct CancelableLease {
    active: AtomicBool,
    interval_secs: u64,
}

impl CancelableLease {
    /// Default renewal cadence for short-lived leases guarding blocked reads.
    pub const DEFAULT_INTERVAL_SECS: u64 = 1;

    pub fn new() -> Self {
        Self::with_interval(Self::DEFAULT_INTERVAL_SECS)
    }

    pub fn with_interval(interval_secs: u64) -> Self {
        Self {
            active: AtomicBool::new(true),
            interval_secs,
        }
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        !self.active.load(Ordering::SeqCst)
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }
}

impl Default for CancelableLease {
    fn default() -> Self {
        Self::new()
    }
}

impl Lease for CancelableLease {
    fn renew(&self) -> Renewal {
        if self.active.load(Ordering::SeqCst) {
            Renewal::After(self.interval_secs)
        } else {
            Renewal::Expire
        }
    }
}
