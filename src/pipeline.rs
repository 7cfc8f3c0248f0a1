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

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::record::format_delivery;
use crate::storage::StorageBackend;
use crate::transport::{Delivery, DeliveryHandler};

/// Counters for deliveries seen by a pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub delivered: u64,
    pub written: u64,
    pub decode_failures: u64,
    pub storage_failures: u64,
}

/// Decodes each delivery and appends it to storage, inline
///
/// Failures never leave this type: a malformed delivery or a failed append
/// is logged and the delivery is dropped.
pub struct RecordPipeline<S: StorageBackend> {
    storage: S,
    stats: PipelineStats,
}

impl<S: StorageBackend> RecordPipeline<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}

#[async_trait]
impl<S: StorageBackend> DeliveryHandler for RecordPipeline<S> {
    async fn on_delivery(&mut self, delivery: Delivery) {
        self.stats.delivered += 1;

        let line = match format_delivery(&delivery.payload, delivery.timestamp.as_ref()) {
            Ok(line) => line,
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!("Dropping malformed delivery: {}", e);
                return;
            }
        };

        debug!("{}", line);

        match self.storage.append(&line).await {
            Ok(()) => self.stats.written += 1,
            Err(e) => {
                self.stats.storage_failures += 1;
                warn!(
                    "Dropping record, {} backend unavailable: {}",
                    self.storage.backend_type(),
                    e
                );
            }
        }
    }
}
