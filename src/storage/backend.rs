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

// Storage backend trait for append-only recording

use async_trait::async_trait;

use crate::error::StorageError;

/// Append-only sink for formatted record lines
///
/// Backends own their open handles exclusively; appends arrive one at a
/// time from the single delivery context, so `&mut self` is enough and no
/// locking is needed around file I/O.
///
/// Query operations are NOT part of this trait. Consumers read the stored
/// files line by line with their own tools.
#[async_trait]
pub trait StorageBackend: Send {
    /// Append one line; the backend adds the terminating newline
    ///
    /// A failure leaves the backend ready to retry from scratch on the next
    /// call. The caller drops the line; nothing is queued.
    async fn append(&mut self, line: &str) -> Result<(), StorageError>;

    /// Flush and release any open handle (best-effort, used at shutdown)
    async fn close(&mut self);

    /// Get backend type identifier
    fn backend_type(&self) -> &str;
}
