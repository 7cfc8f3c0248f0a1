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

// Error taxonomy for fleet-store
//
// - DecodeError:    malformed delivery, dropped and never retried
// - StorageError:   partition directory/file unusable, record dropped
// - TransportError: bus connection failures, recovered by the engine
// - DirectoryError: node registration failures, fatal at startup

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed supply envelope: {0}")]
    Envelope(#[source] prost::DecodeError),

    #[error("malformed fleet payload: {0}")]
    Payload(#[from] prost::DecodeError),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("timestamp out of range: {seconds}s {nanos}ns")]
    InvalidTimestamp { seconds: i64, nanos: i32 },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("can't make dir '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't open file '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't write to '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn path(&self) -> &PathBuf {
        match self {
            StorageError::CreateDir { path, .. }
            | StorageError::Open { path, .. }
            | StorageError::Write { path, .. } => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to bus server [{address}]: {reason}")]
    Connect { address: String, reason: String },

    #[error("failed to subscribe to channel {channel}: {reason}")]
    Subscribe { channel: u32, reason: String },

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("no bus connection installed")]
    NotConnected,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to reach node server [{address}]: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("node server [{address}] did not reply")]
    NoReply { address: String },

    #[error("node server rejected registration: {0}")]
    Rejected(String),

    #[error("malformed node server message: {0}")]
    Json(#[from] serde_json::Error),
}
