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

// Storage backend module
//
// Provides a trait-based abstraction for the durable writer so the
// delivery pipeline can be exercised against any sink. The shipped
// backend appends CSV lines to one file per calendar day.
//
// This module focuses on WRITE-ONLY operations.

pub mod backend;
pub mod clock;
pub mod filesystem;

pub use backend::StorageBackend;
pub use clock::{Clock, LocalClock, ManualClock};
pub use filesystem::PartitionedFileWriter;
