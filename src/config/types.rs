// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for fleet-store

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FleetStoreConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub subscription: SubscriptionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node directory (registration) service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_node_server")]
    pub address: String,

    #[serde(default = "default_node_name")]
    pub node_name: String,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_directory_timeout")]
    pub timeout_seconds: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            address: default_node_server(),
            node_name: default_node_name(),
            key_prefix: default_key_prefix(),
            timeout_seconds: default_directory_timeout(),
        }
    }
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Message bus subscription target
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConfig {
    /// Direct bus server address; bypasses the address handed out by the
    /// node directory when set
    #[serde(default)]
    pub local_server: Option<String>,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_channel_type")]
    pub channel_type: u32,

    #[serde(default = "default_client_label")]
    pub client_label: String,

    /// How often the transport checks that a router is still connected
    #[serde(default = "default_liveness_check_ms")]
    pub liveness_check_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            local_server: None,
            key_prefix: default_key_prefix(),
            channel_type: default_channel_type(),
            client_label: default_client_label(),
            liveness_check_ms: default_liveness_check_ms(),
        }
    }
}

impl BusConfig {
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_check_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionConfig {
    /// Fixed delay between a lost subscription and the reconnect attempt
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_seconds: default_reconnect_delay(),
        }
    }
}

impl SubscriptionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Output directory; relative paths resolve against the working
    /// directory at startup
    #[serde(default = "default_storage_directory")]
    pub directory: String,

    #[serde(default = "default_file_extension")]
    pub file_extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
            file_extension: default_file_extension(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_node_server() -> String { "127.0.0.1:9990".to_string() }
fn default_node_name() -> String { "FleetStore".to_string() }
fn default_key_prefix() -> String { "synerex".to_string() }
fn default_directory_timeout() -> u64 { 10 }
fn default_channel_type() -> u32 { crate::proto::RIDE_SHARE }
fn default_client_label() -> String { "{Client:FleetStore}".to_string() }
fn default_liveness_check_ms() -> u64 { 1000 }
fn default_reconnect_delay() -> u64 { 5 }
fn default_storage_directory() -> String { "store".to_string() }
fn default_file_extension() -> String { "csv".to_string() }
fn default_log_level() -> String { "info".to_string() }
