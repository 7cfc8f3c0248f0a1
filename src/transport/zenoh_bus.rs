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

// Zenoh-backed bus transport

use async_trait::async_trait;
use prost::Message;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use zenoh::{Config, Session};

use super::{BusTransport, Delivery, DeliveryHandler};
use crate::config::BusConfig;
use crate::error::{DecodeError, TransportError};
use crate::proto::Supply;

/// Normalize a server address into a Zenoh endpoint
///
/// Addresses handed out by the node directory are bare `host:port`; those
/// are reached over TCP. Anything already carrying a protocol prefix
/// (`tcp/`, `udp/`, `quic/`...) is used as-is.
pub fn to_endpoint(address: &str) -> String {
    if address.contains('/') {
        address.to_string()
    } else {
        format!("tcp/{}", address)
    }
}

/// Build a client-mode session config that connects only to `address`
pub fn client_config(address: &str) -> Result<Config, String> {
    let endpoints =
        serde_json::to_string(&[to_endpoint(address)]).map_err(|e| e.to_string())?;

    let mut config = Config::default();
    config
        .insert_json5("mode", r#""client""#)
        .map_err(|e| e.to_string())?;
    config
        .insert_json5("connect/endpoints", &endpoints)
        .map_err(|e| e.to_string())?;
    config
        .insert_json5("scouting/multicast/enabled", "false")
        .map_err(|e| e.to_string())?;
    Ok(config)
}

/// Unwrap a `Supply` envelope received on `channel`
///
/// Malformed envelopes and supplies addressed to another channel type are
/// dropped. A supply without content yields an empty payload.
fn supply_to_delivery(bytes: &[u8], channel: u32) -> Option<Delivery> {
    let supply = match Supply::decode(bytes) {
        Ok(supply) => supply,
        Err(e) => {
            warn!(
                "Dropping delivery on channel {}: {}",
                channel,
                DecodeError::Envelope(e)
            );
            return None;
        }
    };

    if supply.channel_type != 0 && supply.channel_type != channel {
        debug!(
            "Ignoring supply for channel {} on channel {} subscription",
            supply.channel_type, channel
        );
        return None;
    }

    Some(Delivery {
        payload: supply.cdata.map(|c| c.entity).unwrap_or_default(),
        timestamp: supply.ts,
    })
}

/// Subscribes to `<key_prefix>/channel/<channel_type>` on a Zenoh router
///
/// Each sample carries a protobuf `Supply` envelope. Zenoh clients
/// reconnect on their own, so loss is detected explicitly: the receive loop
/// ends when the subscriber channel closes, the session is closed, or a
/// periodic check finds no router connected.
pub struct ZenohTransport {
    key_prefix: String,
    liveness_interval: Duration,
}

impl ZenohTransport {
    pub fn new(config: &BusConfig) -> Self {
        Self {
            key_prefix: config.key_prefix.trim_end_matches('/').to_string(),
            liveness_interval: config.liveness_interval(),
        }
    }

    /// Key expression a channel is published on
    pub fn channel_key(&self, channel: u32) -> String {
        format!("{}/channel/{}", self.key_prefix, channel)
    }

    async fn router_connected(session: &Session) -> bool {
        if session.is_closed() {
            return false;
        }
        let mut routers = session.info().routers_zid().await;
        routers.next().is_some()
    }
}

#[async_trait]
impl BusTransport for ZenohTransport {
    type Connection = Session;

    async fn connect(&self, address: &str) -> Result<Session, TransportError> {
        let config = client_config(address).map_err(|reason| TransportError::Connect {
            address: address.to_string(),
            reason,
        })?;

        let session = zenoh::open(config)
            .await
            .map_err(|e| TransportError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        info!("Zenoh session opened to [{}]", address);
        Ok(session)
    }

    async fn subscribe(
        &self,
        session: &Session,
        channel: u32,
        client_label: &str,
        handler: &mut dyn DeliveryHandler,
    ) -> TransportError {
        let key = self.channel_key(channel);
        let subscriber = match session.declare_subscriber(key.clone()).await {
            Ok(subscriber) => subscriber,
            Err(e) => {
                return TransportError::Subscribe {
                    channel,
                    reason: e.to_string(),
                }
            }
        };

        info!("Subscribed to '{}' as {}", key, client_label);

        let mut liveness = tokio::time::interval(self.liveness_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = subscriber.recv_async() => match received {
                    Ok(sample) => {
                        let bytes = sample.payload().to_bytes();
                        if let Some(delivery) = supply_to_delivery(&bytes, channel) {
                            handler.on_delivery(delivery).await;
                        }
                    }
                    Err(e) => {
                        return TransportError::ConnectionLost(format!(
                            "subscriber on '{}' closed: {}",
                            key, e
                        ));
                    }
                },
                _ = liveness.tick() => {
                    if !Self::router_connected(session).await {
                        return TransportError::ConnectionLost(format!(
                            "no router connected for '{}'",
                            key
                        ));
                    }
                }
            }
        }
    }
}
