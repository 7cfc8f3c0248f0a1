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

use fleet_store::proto::{Content, Coord, Fleet, Supply, RIDE_SHARE};
use fleet_store::protocol::{RegisterRequest, RegisterResponse, UnregisterRequest};
use fleet_store::record::Record;
use prost::Message;
use prost_types::Timestamp;

#[test]
fn test_register_request_wire_format() {
    let request = RegisterRequest {
        node_name: "FleetStore".to_string(),
        channel_types: vec![RIDE_SHARE],
        version: None,
    };

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "node_name": "FleetStore",
            "channel_types": [1]
        })
    );
}

#[test]
fn test_register_request_defaults_channel_types() {
    let request: RegisterRequest =
        serde_json::from_str(r#"{"node_name":"FleetStore"}"#).unwrap();
    assert!(request.channel_types.is_empty());
    assert_eq!(request.version, None);
}

#[test]
fn test_register_response_parsing() {
    let response: RegisterResponse =
        serde_json::from_str(r#"{"node_id":12,"server_address":"127.0.0.1:10000"}"#).unwrap();
    assert_eq!(response.node_id, 12);
    assert_eq!(response.server_address, "127.0.0.1:10000");
}

#[test]
fn test_register_response_missing_address_fails() {
    let result = serde_json::from_str::<RegisterResponse>(r#"{"node_id":12}"#);
    assert!(result.is_err());
}

#[test]
fn test_unregister_request_wire_format() {
    let json = serde_json::to_string(&UnregisterRequest { node_id: 3 }).unwrap();
    assert_eq!(json, r#"{"node_id":3}"#);
}

#[test]
fn test_supply_envelope_carries_fleet_entity() {
    let fleet = Fleet {
        vehicle_id: 42,
        coord: Some(Coord {
            lat: 35.681,
            lon: 139.767,
        }),
        angle: 90.0,
        speed: 12,
        status: 0,
    };
    let ts = Timestamp {
        seconds: 1_709_287_200,
        nanos: 0,
    };
    let supply = Supply {
        channel_type: RIDE_SHARE,
        supply_name: "fleet".to_string(),
        ts: Some(ts),
        cdata: Some(Content {
            entity: fleet.encode_to_vec(),
        }),
        ..Supply::default()
    };

    let decoded = Supply::decode(supply.encode_to_vec().as_slice()).unwrap();
    let entity = decoded.cdata.unwrap().entity;
    let record = Record::decode(&entity, decoded.ts.as_ref().unwrap()).unwrap();

    assert_eq!(record.entity_id, 42);
    assert_eq!(record.speed, 12);
    assert_eq!(
        record.to_line(),
        "2024-03-01T10:00:00Z,42,35.681000,139.767000,90.000000,12"
    );
}
