//! Demo wiring: an in-process registry, an agent advertising on it, and a
//! lookup pass finding the advertisement. Everything runs in one process
//! so the moving parts can be watched via `RUST_LOG=debug`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use herald_agent::{load_config, RegistrationAgent, WaitMode};
use herald_discovery::{RegistryHandle, RegistryIdentity, RegistryLocator, StaticBroadcast};
use herald_lookup::{Finder, MockProber, Waiter};
use herald_registry::{MemoryRegistry, Registry, ServiceHandle};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config(&PathBuf::from("herald.toml")).context("load config")?;

    tracing::info!("herald demo starting");
    tracing::info!("broadcast_list = {:?}", config.broadcast_list);
    tracing::info!("check_interval = {}s", config.check_interval_secs);

    let registry = Arc::new(MemoryRegistry::new());
    let handle = RegistryHandle::new(
        RegistryIdentity::new("mem://demo", 1),
        registry as Arc<dyn Registry>,
    );
    let transport = Arc::new(StaticBroadcast::new(vec![handle]));
    let locator = RegistryLocator::with_broadcast_list(transport, config.broadcast_list.clone());

    let agent = RegistrationAgent::with_name(
        ServiceHandle::local("hello from herald"),
        "motd",
        config.name.as_deref(),
        locator.clone(),
    )
    .check_interval(Duration::from_secs(config.check_interval_secs));

    tracing::info!(identifier = %agent.identifier(), "registering service");
    let running = agent.run(WaitMode::FirstRegister).await;

    let waiter = Waiter::new(locator.clone());
    let handle = waiter.wait_for("motd").await;
    tracing::info!("wait_for resolved: {handle:?}");

    let finder = Finder::new(locator, Arc::new(MockProber::new()));
    let entry = finder.find("motd").await?;
    tracing::info!(identifier = %entry.identifier, "found service: {:?}", entry.handle);

    running.stop();
    running.join().await?;
    tracing::info!("herald demo done");
    Ok(())
}
