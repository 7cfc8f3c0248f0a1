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

//! Protobuf messages carried on the bus.
//!
//! `Supply` is the envelope published on a channel; its `cdata.entity`
//! holds the encoded domain message (`Fleet` for the ride-share channel).

use prost_types::Timestamp;

/// Channel type code for ride-share fleet telemetry.
pub const RIDE_SHARE: u32 = 1;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Supply {
    #[prost(fixed64, tag = "1")]
    pub id: u64,
    #[prost(fixed64, tag = "2")]
    pub sender_id: u64,
    #[prost(fixed64, tag = "3")]
    pub target_id: u64,
    #[prost(uint32, tag = "4")]
    pub channel_type: u32,
    #[prost(string, tag = "5")]
    pub supply_name: String,
    #[prost(message, optional, tag = "6")]
    pub ts: Option<Timestamp>,
    #[prost(message, optional, tag = "8")]
    pub cdata: Option<Content>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Content {
    #[prost(bytes = "vec", tag = "1")]
    pub entity: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Fleet {
    #[prost(int32, tag = "1")]
    pub vehicle_id: i32,
    #[prost(message, optional, tag = "2")]
    pub coord: Option<Coord>,
    #[prost(double, tag = "3")]
    pub angle: f64,
    #[prost(int32, tag = "4")]
    pub speed: i32,
    #[prost(int32, tag = "5")]
    pub status: i32,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Coord {
    #[prost(double, tag = "1")]
    pub lat: f64,
    #[prost(double, tag = "2")]
    pub lon: f64,
}
