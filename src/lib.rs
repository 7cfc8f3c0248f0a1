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

// Fleet Store: resilient fleet telemetry subscriber
//
// A long-running subscriber that:
// - Registers with the node directory and resolves its bus server
// - Subscribes to the ride-share fleet channel over Zenoh
// - Survives bus disconnects with a fixed-delay reconnect loop
// - Decodes each delivery into a CSV line
// - Appends lines to one file per calendar day

pub mod config;
pub mod directory;
pub mod error;
pub mod pipeline;
pub mod proto;
pub mod protocol;
pub mod record;
pub mod storage;
pub mod subscription;
pub mod transport;

// Re-export main types
pub use config::{load_config, load_config_with_env, FleetStoreConfig};
pub use directory::{resolve_server_address, NodeDirectory, Registration, ZenohDirectory};
pub use error::{DecodeError, DirectoryError, StorageError, TransportError};
pub use pipeline::{PipelineStats, RecordPipeline};
pub use record::{format_delivery, Record};
pub use storage::{PartitionedFileWriter, StorageBackend};
pub use subscription::{ConnectionSlot, EngineState, SubscriptionEngine, SubscriptionSettings};
pub use transport::{BusTransport, Delivery, DeliveryHandler, ZenohTransport};
