//! Service lookup.
//!
//! [`Finder`] answers "is anyone offering this service right now" with a
//! single discovery pass and liveness-checked candidates. [`Waiter`]
//! answers "tell me as soon as someone offers it", holding blocking reads
//! open against every registry it discovers until one produces a match.

pub mod finder;
pub mod probe;
pub mod waiter;

pub use finder::{Finder, LookupError};
pub use probe::{MockProber, Prober};
pub use waiter::{WaitConfig, Waiter};
