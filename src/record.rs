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

//! Fleet telemetry record decoding and CSV line formatting
//!
//! The line layout is consumed by downstream tooling and must not change:
//!
//! ```text
//! timestamp,entity_id,latitude,longitude,heading,speed
//! 2024-03-01T10:00:00Z,42,35.681000,139.767000,90.000000,12
//! ```
//!
//! - `timestamp`: RFC 3339 in UTC with a `Z` suffix; a non-zero fraction is
//!   written with trailing zeros trimmed (`10:00:00.25Z`, `10:00:00.0000012Z`)
//! - floating point columns: fixed six decimals
//! - integer columns: plain decimal

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use prost::Message;
use prost_types::Timestamp;

use crate::error::DecodeError;
use crate::proto::Fleet;

/// One decoded telemetry observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    /// Time the origin system produced the observation
    pub timestamp: DateTime<Utc>,
    pub entity_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f64,
    pub speed: i32,
}

impl Record {
    /// Decode a `Fleet` payload stamped with the delivery's origin timestamp
    pub fn decode(payload: &[u8], timestamp: &Timestamp) -> Result<Self, DecodeError> {
        let fleet = Fleet::decode(payload)?;
        let coord = fleet.coord.ok_or(DecodeError::MissingField("coord"))?;

        Ok(Self {
            timestamp: to_datetime(timestamp)?,
            entity_id: fleet.vehicle_id,
            latitude: coord.lat,
            longitude: coord.lon,
            heading: fleet.angle,
            speed: fleet.speed,
        })
    }

    /// Render the canonical CSV line (no trailing newline)
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{:.6},{:.6},{:.6},{}",
            format_timestamp(&self.timestamp),
            self.entity_id,
            self.latitude,
            self.longitude,
            self.heading,
            self.speed
        )
    }
}

/// Decode a raw delivery and render it as a CSV line
pub fn format_delivery(
    payload: &[u8],
    timestamp: Option<&Timestamp>,
) -> Result<String, DecodeError> {
    let timestamp = timestamp.ok_or(DecodeError::MissingField("ts"))?;
    Record::decode(payload, timestamp).map(|record| record.to_line())
}

/// RFC 3339 with the shortest fraction that keeps every non-zero digit
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    if timestamp.nanosecond() == 0 {
        return timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
    }
    let full = timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true);
    let fraction = full.strip_suffix('Z').unwrap_or(&full);
    format!("{}Z", fraction.trim_end_matches('0'))
}

fn to_datetime(ts: &Timestamp) -> Result<DateTime<Utc>, DecodeError> {
    let invalid = || DecodeError::InvalidTimestamp {
        seconds: ts.seconds,
        nanos: ts.nanos,
    };
    let nanos = u32::try_from(ts.nanos).map_err(|_| invalid())?;
    DateTime::from_timestamp(ts.seconds, nanos).ok_or_else(invalid)
}
