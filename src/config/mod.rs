// Configuration module for fleet-store
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::Path;

/// Env var overriding `directory.address`
pub const NODE_SERVER_ENV: &str = "FLEET_STORE_NODE_SERVER";
/// Env var overriding `bus.local_server`
pub const LOCAL_SERVER_ENV: &str = "FLEET_STORE_LOCAL_SERVER";

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FleetStoreConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<FleetStoreConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Allow environment variables to override config values
pub fn apply_env_overrides(config: &mut FleetStoreConfig) {
    if let Ok(address) = std::env::var(NODE_SERVER_ENV) {
        config.directory.address = address;
    }

    if let Ok(local) = std::env::var(LOCAL_SERVER_ENV) {
        if !local.is_empty() {
            config.bus.local_server = Some(local);
        }
    }
}
