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

// Day-partitioned append-only file backend

use super::backend::StorageBackend;
use super::clock::{Clock, LocalClock};
use crate::config::StorageConfig;
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

const PARTITION_FORMAT: &str = "%Y-%m-%d";

/// The partition currently open for append
struct ActivePartition {
    key: NaiveDate,
    path: PathBuf,
    file: fs::File,
}

/// Writes one line per record into `<directory>/<YYYY-MM-DD>.<ext>`
///
/// The partition key is the wall-clock date at write time, checked on every
/// append. When it changes, the open file is closed and the next one is
/// opened (created if missing, appended to if present).
pub struct PartitionedFileWriter<C: Clock = LocalClock> {
    directory: PathBuf,
    extension: String,
    clock: C,
    active: Option<ActivePartition>,
    rotations: u64,
}

impl PartitionedFileWriter<LocalClock> {
    pub fn new(config: &StorageConfig) -> Self {
        Self::with_clock(config, LocalClock)
    }
}

impl<C: Clock> PartitionedFileWriter<C> {
    pub fn with_clock(config: &StorageConfig, clock: C) -> Self {
        let directory = PathBuf::from(&config.directory);
        info!(
            "Initializing partitioned file writer at: {}",
            directory.display()
        );

        Self {
            directory,
            extension: config.file_extension.clone(),
            clock,
            active: None,
            rotations: 0,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Date of the partition currently open, if any
    pub fn active_partition(&self) -> Option<NaiveDate> {
        self.active.as_ref().map(|active| active.key)
    }

    /// Number of times an open partition was closed because the date changed
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// File path for a given partition key
    pub fn partition_path(&self, key: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("{}.{}", key.format(PARTITION_FORMAT), self.extension))
    }

    /// Return the open partition for `today`, rotating or opening as needed
    async fn partition_for(
        &mut self,
        today: NaiveDate,
    ) -> Result<&mut ActivePartition, StorageError> {
        let active = match self.active.take() {
            Some(active) if active.key == today => active,
            stale => {
                if let Some(stale) = stale {
                    info!(
                        "Rotating partition {} -> {}",
                        stale.key.format(PARTITION_FORMAT),
                        today.format(PARTITION_FORMAT)
                    );
                    Self::release(stale).await;
                    self.rotations += 1;
                }
                self.open_partition(today).await?
            }
        };

        Ok(self.active.insert(active))
    }

    async fn open_partition(&self, key: NaiveDate) -> Result<ActivePartition, StorageError> {
        // create_dir_all succeeds when the directory already exists
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: self.directory.clone(),
                source,
            })?;

        let path = self.partition_path(key);
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| StorageError::Open {
                path: path.clone(),
                source,
            })?;

        debug!("Opened partition file {}", path.display());
        Ok(ActivePartition { key, path, file })
    }

    async fn release(mut active: ActivePartition) {
        if let Err(e) = active.file.flush().await {
            error!("Failed to flush {}: {}", active.path.display(), e);
        }
    }
}

#[async_trait]
impl<C: Clock> StorageBackend for PartitionedFileWriter<C> {
    async fn append(&mut self, line: &str) -> Result<(), StorageError> {
        let today = self.clock.today();

        let active = match self.partition_for(today).await {
            Ok(active) => active,
            Err(e) => {
                error!("{}", e);
                return Err(e);
            }
        };

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        let written = match active.file.write_all(&buf).await {
            Ok(()) => active.file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(source) = written {
            let err = StorageError::Write {
                path: active.path.clone(),
                source,
            };
            error!("{}", err);
            // Reopen from scratch on the next append
            self.active = None;
            return Err(err);
        }

        Ok(())
    }

    async fn close(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("Closing partition file {}", active.path.display());
            Self::release(active).await;
        }
    }

    fn backend_type(&self) -> &str {
        "filesystem"
    }
}
