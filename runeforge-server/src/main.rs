//! # runeforge-server
//!
//! The Runeforge script host server.
//!
//! This server is responsible for:
//! - Discovering and loading operator scripts at startup
//! - Resolving script dependencies against artifact repositories
//! - Running each script in its own isolated context
//! - Marshaling script access to world state onto the host thread
//! - Serving operator lifecycle commands on the console
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------------+
//! |                    runeforge-server                       |
//! |                                                           |
//! |  +------------+  +-------------+  +-------------------+   |
//! |  |   Script   |  |  Lifecycle  |  |    Dependency     |   |
//! |  |  Registry  |  |  Controller |  |     Resolver      |   |
//! |  +------------+  +-------------+  +-------------------+   |
//! |                                                           |
//! |  +---------------------------------------------------+    |
//! |  |      Host thread (world state, event dispatch)    |    |
//! |  +---------------------------------------------------+    |
//! +-----------------------------------------------------------+
//!           |                 |                  |
//!           v                 v                  v
//!    scripts/*.rhai    artifact cache     repositories
//! ```
//!
//! ## Configuration
//!
//! The server reads configuration from
//! `$XDG_CONFIG_HOME/runeforge/config.toml`.
//!
//! ## Running
//!
//! ```bash
//! # Start the server
//! cargo run --bin runeforge-server
//!
//! # With debug logging
//! RUST_LOG=debug cargo run --bin runeforge-server
//! ```

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use runeforge_host::{text_module, EventBus, HostApi, HostBridge, WorldState};
use runeforge_resolver::{ArtifactCache, Resolver};
use runeforge_runtime::{ContextLoader, EngineLimits};
use runeforge_server::commands;
use runeforge_server::config::Config;
use runeforge_server::lifecycle::LifecycleController;
use runeforge_server::registry::ScriptRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting runeforge-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from config.toml
    let config = match Config::load_default() {
        Ok(cfg) => {
            info!("Loaded configuration from default path");
            cfg
        }
        Err(e) => {
            tracing::warn!("Failed to load configuration, using defaults: {:#}", e);
            Config::default()
        }
    };

    let scripts_dir = config.scripts_dir()?;
    std::fs::create_dir_all(&scripts_dir)?;
    info!("Scripts directory: {}", scripts_dir.display());

    // Host thread and world state
    let bridge = HostBridge::start(config.limits.host_queue_capacity, WorldState::new());

    // Dependency resolution
    let resolver = Arc::new(Resolver::new(
        ArtifactCache::new(config.cache_dir()?),
        config.build_repositories(),
    ));

    // Context loader with the shared base modules
    let mut loader = ContextLoader::new(EngineLimits {
        max_operations: config.limits.max_operations,
        max_call_depth: config.limits.max_call_depth,
    });
    loader.add_base_module("text", text_module());

    let controller = Arc::new(LifecycleController::new(
        Arc::new(ScriptRegistry::new()),
        resolver,
        Arc::new(loader),
        HostApi::new(Arc::clone(&bridge), config.data_dir()?),
        Arc::new(EventBus::new()),
        scripts_dir,
        Duration::from_secs(config.limits.resolve_timeout_secs),
        Duration::from_secs(config.limits.load_timeout_secs),
    ));

    controller.load_all().await?;

    // Operator console: load/reload/unload/list, quit to stop.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        println!("{}", commands::execute(&controller, line).await);
    }

    info!("Shutting down");
    controller.unload_all().await;
    bridge.shutdown();
    Ok(())
}
