//! Service registration agent.
//!
//! An agent advertises one service handle on a broadcast-discovered
//! registry and re-registers it whenever the registration or the registry
//! itself goes away. The registry drops the entry on its own once the
//! agent's process dies and the lease stops renewing, so both sides heal
//! independently.

pub mod agent;
pub mod config;

pub use agent::{
    AgentError, AgentHandle, RegistrationAgent, WaitMode, DEFAULT_CHECK_INTERVAL_SECS,
    REGISTRATION_RENEW_SECS,
};
pub use config::{load_config, AgentConfig};
