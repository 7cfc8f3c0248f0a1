// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").expect("valid env var pattern")
});

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<FleetStoreConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        Self::parse(&content)
    }

    /// Parse YAML content, substituting env vars and validating the result
    pub fn parse(content: &str) -> Result<FleetStoreConfig> {
        let content = Self::substitute_env_vars(content);

        let config: FleetStoreConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${NODE_SERVER:-127.0.0.1:9990} -> 127.0.0.1:9990 (if NODE_SERVER not set)
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default_value = caps.get(2).map(|m| m.as_str());

                match std::env::var(var_name) {
                    Ok(value) => value,
                    Err(_) => match default_value {
                        Some(default) => default.to_string(),
                        // Keep original if no default and var not found
                        None => format!("${{{}}}", var_name),
                    },
                }
            })
            .to_string()
    }

    /// Validate configuration
    pub fn validate(config: &FleetStoreConfig) -> Result<()> {
        if config.directory.address.trim().is_empty() {
            bail!("directory.address cannot be empty");
        }

        if config.directory.node_name.trim().is_empty() {
            bail!("directory.node_name cannot be empty");
        }

        if config.directory.key_prefix.trim().is_empty() {
            bail!("directory.key_prefix cannot be empty");
        }

        if let Some(local) = &config.bus.local_server {
            if local.trim().is_empty() {
                bail!("bus.local_server cannot be empty when set");
            }
        }

        if config.bus.key_prefix.trim().is_empty() {
            bail!("bus.key_prefix cannot be empty");
        }

        if config.bus.client_label.is_empty() {
            bail!("bus.client_label cannot be empty");
        }

        if config.bus.liveness_check_ms == 0 {
            bail!("bus.liveness_check_ms must be > 0");
        }

        if config.subscription.reconnect_delay_seconds == 0 {
            bail!("subscription.reconnect_delay_seconds must be > 0");
        }

        if config.storage.directory.trim().is_empty() {
            bail!("storage.directory cannot be empty");
        }

        if config.storage.file_extension.trim().is_empty() {
            bail!("storage.file_extension cannot be empty");
        }

        Ok(())
    }
}
