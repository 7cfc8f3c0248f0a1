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

// Message bus transport abstraction
//
// The subscription engine only needs two primitives from the bus:
// open a connection to a server address, and run a receive loop on a
// channel until that connection breaks. Everything protocol specific
// lives behind `BusTransport`.

pub mod zenoh_bus;

pub use zenoh_bus::ZenohTransport;

use async_trait::async_trait;
use prost_types::Timestamp;

use crate::error::TransportError;

/// One message received on a subscribed channel
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Encoded domain message
    pub payload: Vec<u8>,
    /// Origin timestamp stamped by the publisher
    pub timestamp: Option<Timestamp>,
}

/// Per-delivery callback invoked by the transport's receive loop
///
/// The transport awaits each call before receiving the next message, so at
/// most one delivery is in flight per subscription.
#[async_trait]
pub trait DeliveryHandler: Send {
    async fn on_delivery(&mut self, delivery: Delivery);
}

#[async_trait]
pub trait BusTransport: Send + Sync + 'static {
    /// Cheap, cloneable handle to an open bus connection
    type Connection: Clone + Send + Sync + 'static;

    async fn connect(&self, address: &str) -> Result<Self::Connection, TransportError>;

    /// Receive on `channel` until the connection is lost
    ///
    /// Only returns when the receive loop has ended; the returned error
    /// describes why.
    async fn subscribe(
        &self,
        connection: &Self::Connection,
        channel: u32,
        client_label: &str,
        handler: &mut dyn DeliveryHandler,
    ) -> TransportError;
}
