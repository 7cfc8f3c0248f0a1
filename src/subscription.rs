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

//! Resilient subscription engine
//!
//! Keeps one subscription alive for the lifetime of the process:
//!
//! ```text
//! DISCONNECTED -> CONNECTING -> SUBSCRIBED -> RECOVERING -+
//!                     ^                                   |
//!                     +-----------------------------------+
//! ```
//!
//! Only the very first connect may fail the engine. After that, every lost
//! subscription goes through recovery: discard the connection, wait the
//! fixed reconnect delay, reconnect unless someone else already did, and
//! subscribe again on whatever connection is installed.
//!
//! The connection lives in a [`ConnectionSlot`] shared with other tasks. Its
//! lock is held for check-and-replace only, never across the subscribe
//! call or the reconnect delay.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{BusConfig, SubscriptionConfig};
use crate::error::TransportError;
use crate::transport::{BusTransport, DeliveryHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disconnected,
    Connecting,
    Subscribed,
    Recovering,
    /// Shutdown was requested; terminal
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    /// Bus server, resolved once at startup
    pub address: String,
    pub channel: u32,
    pub client_label: String,
    pub reconnect_delay: Duration,
}

impl SubscriptionSettings {
    pub fn from_config(
        address: impl Into<String>,
        bus: &BusConfig,
        subscription: &SubscriptionConfig,
    ) -> Self {
        Self {
            address: address.into(),
            channel: bus.channel_type,
            client_label: bus.client_label.clone(),
            reconnect_delay: subscription.reconnect_delay(),
        }
    }
}

/// Shared cell holding the current bus connection
///
/// `None` means the connection was discarded and has not been replaced yet.
pub struct ConnectionSlot<C> {
    inner: Arc<Mutex<Option<C>>>,
}

impl<C> Clone for ConnectionSlot<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clone> ConnectionSlot<C> {
    fn new(connection: Option<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(connection)),
        }
    }

    /// Clone of the installed connection, if any
    pub async fn current(&self) -> Option<C> {
        self.inner.lock().await.clone()
    }

    pub async fn is_discarded(&self) -> bool {
        self.inner.lock().await.is_none()
    }

    /// Mark the connection as discarded; returns whether one was installed
    pub async fn discard(&self) -> bool {
        self.inner.lock().await.take().is_some()
    }

    /// Install a repaired connection, returning the one it replaced
    pub async fn install(&self, connection: C) -> Option<C> {
        self.inner.lock().await.replace(connection)
    }

    async fn lock(&self) -> MutexGuard<'_, Option<C>> {
        self.inner.lock().await
    }
}

pub struct SubscriptionEngine<T: BusTransport> {
    transport: Arc<T>,
    settings: SubscriptionSettings,
    slot: ConnectionSlot<T::Connection>,
    state: watch::Sender<EngineState>,
}

impl<T: BusTransport> SubscriptionEngine<T> {
    /// Make the initial connection
    ///
    /// Failing here is fatal: without a first server there is nothing to
    /// recover towards.
    pub async fn connect(
        transport: Arc<T>,
        settings: SubscriptionSettings,
    ) -> Result<Self, TransportError> {
        let (state, _) = watch::channel(EngineState::Disconnected);

        state.send_replace(EngineState::Connecting);
        let connection = transport.connect(&settings.address).await?;
        info!("Connected to bus server [{}]", settings.address);

        Ok(Self {
            transport,
            settings,
            slot: ConnectionSlot::new(Some(connection)),
            state,
        })
    }

    pub fn settings(&self) -> &SubscriptionSettings {
        &self.settings
    }

    pub fn connection_slot(&self) -> ConnectionSlot<T::Connection> {
        self.slot.clone()
    }

    /// Watch the engine's state transitions
    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Subscribe and keep re-subscribing until `shutdown` is cancelled
    ///
    /// Deliveries are handed to `handler` one at a time. The handler is
    /// returned once the engine stops so its resources can be released.
    pub async fn run<H: DeliveryHandler>(
        self,
        mut handler: H,
        shutdown: CancellationToken,
    ) -> H {
        info!(
            "Subscribing to channel {} as {}",
            self.settings.channel, self.settings.client_label
        );

        while !shutdown.is_cancelled() {
            self.state.send_replace(EngineState::Connecting);

            let error = match self.slot.current().await {
                Some(connection) => {
                    self.state.send_replace(EngineState::Subscribed);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        error = self.transport.subscribe(
                            &connection,
                            self.settings.channel,
                            &self.settings.client_label,
                            &mut handler,
                        ) => error,
                    }
                }
                None => TransportError::NotConnected,
            };

            warn!("Error on subscribe: {}", error);
            self.state.send_replace(EngineState::Recovering);

            if !self.recover(&shutdown).await {
                break;
            }
        }

        self.state.send_replace(EngineState::Stopped);
        info!("Subscription engine stopped");
        handler
    }

    /// One recovery pass; returns false when interrupted by shutdown
    async fn recover(&self, shutdown: &CancellationToken) -> bool {
        if self.slot.discard().await {
            info!("Client reset");
        }

        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
        }

        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            // Repaired by another task while we waited
            info!("Use reconnected server");
            return true;
        }

        let reconnected = tokio::select! {
            _ = shutdown.cancelled() => return false,
            result = self.transport.connect(&self.settings.address) => result,
        };

        match reconnected {
            Ok(connection) => {
                info!("Reconnect server [{}]", self.settings.address);
                *slot = Some(connection);
            }
            Err(e) => {
                warn!("Reconnect failed, retrying after delay: {}", e);
            }
        }
        true
    }
}
