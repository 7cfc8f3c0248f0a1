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

// Node directory client
//
// At startup the node registers its name and the channel types it
// consumes; the directory answers with the bus server to connect to. On
// shutdown the node deregisters (best-effort).

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};
use zenoh::Session;

use crate::config::DirectoryConfig;
use crate::error::DirectoryError;
use crate::protocol::{RegisterRequest, RegisterResponse, UnregisterRequest};
use crate::transport::zenoh_bus::client_config;

/// Outcome of a successful node registration
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub node_id: u64,
    pub server_address: String,
}

impl From<RegisterResponse> for Registration {
    fn from(response: RegisterResponse) -> Self {
        Self {
            node_id: response.node_id,
            server_address: response.server_address,
        }
    }
}

#[async_trait]
pub trait NodeDirectory: Send + Sync {
    async fn register(
        &self,
        node_name: &str,
        channel_types: &[u32],
    ) -> Result<Registration, DirectoryError>;

    async fn unregister(&self, registration: &Registration) -> Result<(), DirectoryError>;
}

/// Bus server to connect to: the local override when set, else the
/// registered address
pub fn resolve_server_address(registration: &Registration, local_override: Option<&str>) -> String {
    match local_override {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => registration.server_address.clone(),
    }
}

/// Decode a registration reply body
pub fn parse_register_reply(body: &[u8]) -> Result<Registration, DirectoryError> {
    let response: RegisterResponse = serde_json::from_slice(body)?;
    if response.server_address.trim().is_empty() {
        return Err(DirectoryError::Rejected(
            "empty server address in registration reply".to_string(),
        ));
    }
    Ok(response.into())
}

/// Node directory reached over Zenoh queries
///
/// Registration is a query on `<key_prefix>/nodes/register` with a JSON
/// `RegisterRequest` payload; deregistration queries
/// `<key_prefix>/nodes/unregister`.
pub struct ZenohDirectory {
    session: Session,
    address: String,
    key_prefix: String,
    timeout: Duration,
}

impl ZenohDirectory {
    pub async fn connect(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let unreachable = |reason: String| DirectoryError::Unreachable {
            address: config.address.clone(),
            reason,
        };

        let zenoh_config = client_config(&config.address).map_err(unreachable)?;
        let session = zenoh::open(zenoh_config)
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        info!("Connected to node server [{}]", config.address);

        Ok(Self {
            session,
            address: config.address.clone(),
            key_prefix: config.key_prefix.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        })
    }

    async fn request(&self, operation: &str, body: Vec<u8>) -> Result<Vec<u8>, DirectoryError> {
        let key = format!("{}/nodes/{}", self.key_prefix, operation);

        let replies = self
            .session
            .get(key.as_str())
            .payload(body)
            .timeout(self.timeout)
            .await
            .map_err(|e| DirectoryError::Unreachable {
                address: self.address.clone(),
                reason: e.to_string(),
            })?;

        let reply = replies
            .recv_async()
            .await
            .map_err(|_| DirectoryError::NoReply {
                address: self.address.clone(),
            })?;

        match reply.result() {
            Ok(sample) => Ok(sample.payload().to_bytes().into_owned()),
            Err(err) => Err(DirectoryError::Rejected(
                String::from_utf8_lossy(&err.payload().to_bytes()).into_owned(),
            )),
        }
    }

    /// Close the directory session
    pub async fn close(self) {
        if let Err(e) = self.session.close().await {
            warn!("Failed to close node server session: {}", e);
        }
    }
}

#[async_trait]
impl NodeDirectory for ZenohDirectory {
    async fn register(
        &self,
        node_name: &str,
        channel_types: &[u32],
    ) -> Result<Registration, DirectoryError> {
        let request = RegisterRequest {
            node_name: node_name.to_string(),
            channel_types: channel_types.to_vec(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        };

        let body = self.request("register", serde_json::to_vec(&request)?).await?;
        let registration = parse_register_reply(&body)?;

        info!(
            "Registered node '{}' as {} (server [{}])",
            node_name, registration.node_id, registration.server_address
        );
        Ok(registration)
    }

    async fn unregister(&self, registration: &Registration) -> Result<(), DirectoryError> {
        let request = UnregisterRequest {
            node_id: registration.node_id,
        };
        self.request("unregister", serde_json::to_vec(&request)?)
            .await?;

        info!("Unregistered node {}", registration.node_id);
        Ok(())
    }
}
