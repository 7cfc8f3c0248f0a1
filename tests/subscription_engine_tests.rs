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
use chrono::NaiveDate;
use fleet_store::config::StorageConfig;
use fleet_store::proto::{Coord, Fleet};
use fleet_store::storage::{ManualClock, PartitionedFileWriter};
use fleet_store::{
    BusTransport, Delivery, DeliveryHandler, EngineState, RecordPipeline, SubscriptionEngine,
    SubscriptionSettings, TransportError,
};
use prost::Message;
use prost_types::Timestamp;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How a single subscribe call behaves
enum Session {
    /// Deliver, then report the connection as lost
    FailAfter(Vec<Delivery>),
    /// Deliver, then stay subscribed until cancelled
    Hang(Vec<Delivery>),
}

#[derive(Default)]
struct MockTransport {
    /// Scripted connect outcomes; succeeds once exhausted
    connect_results: Mutex<VecDeque<bool>>,
    /// Scripted subscribe sessions; hangs once exhausted
    sessions: Mutex<VecDeque<Session>>,
    next_id: AtomicU32,
    connects: AtomicUsize,
    subscribes: Mutex<Vec<(u32, Instant)>>,
}

impl MockTransport {
    fn new(connect_results: Vec<bool>, sessions: Vec<Session>) -> Arc<Self> {
        Arc::new(Self {
            connect_results: Mutex::new(connect_results.into()),
            sessions: Mutex::new(sessions.into()),
            ..Self::default()
        })
    }

    fn next_connect(&self) -> bool {
        self.connect_results.lock().unwrap().pop_front().unwrap_or(true)
    }

    fn next_session(&self) -> Session {
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Session::Hang(Vec::new()))
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn subscribes(&self) -> Vec<(u32, Instant)> {
        self.subscribes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BusTransport for MockTransport {
    type Connection = u32;

    async fn connect(&self, address: &str) -> Result<u32, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.next_connect() {
            Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        } else {
            Err(TransportError::Connect {
                address: address.to_string(),
                reason: "refused".to_string(),
            })
        }
    }

    async fn subscribe(
        &self,
        connection: &u32,
        _channel: u32,
        _client_label: &str,
        handler: &mut dyn DeliveryHandler,
    ) -> TransportError {
        self.subscribes
            .lock()
            .unwrap()
            .push((*connection, Instant::now()));

        match self.next_session() {
            Session::FailAfter(deliveries) => {
                for delivery in deliveries {
                    handler.on_delivery(delivery).await;
                }
                TransportError::ConnectionLost("stream reset".to_string())
            }
            Session::Hang(deliveries) => {
                for delivery in deliveries {
                    handler.on_delivery(delivery).await;
                }
                std::future::pending::<TransportError>().await
            }
        }
    }
}

#[derive(Default)]
struct CollectingHandler {
    seen: Arc<Mutex<Vec<Delivery>>>,
}

#[async_trait]
impl DeliveryHandler for CollectingHandler {
    async fn on_delivery(&mut self, delivery: Delivery) {
        self.seen.lock().unwrap().push(delivery);
    }
}

fn settings(delay: Duration) -> SubscriptionSettings {
    SubscriptionSettings {
        address: "127.0.0.1:10000".to_string(),
        channel: 1,
        client_label: "{Client:FleetStore}".to_string(),
        reconnect_delay: delay,
    }
}

fn delivery(id: u8) -> Delivery {
    Delivery {
        payload: vec![id],
        timestamp: None,
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_first_connect_failure_is_fatal() {
    let transport = MockTransport::new(vec![false], vec![]);

    let result =
        SubscriptionEngine::connect(transport.clone(), settings(Duration::from_millis(10))).await;

    assert!(matches!(result, Err(TransportError::Connect { .. })));
    assert_eq!(transport.connects(), 1);
    assert!(transport.subscribes().is_empty());
}

#[tokio::test]
async fn test_reaches_subscribed_after_k_lost_connections() {
    const K: usize = 3;
    let delay = Duration::from_millis(50);
    let sessions = (0..K).map(|_| Session::FailAfter(Vec::new())).collect();
    let transport = MockTransport::new(vec![], sessions);

    let engine = SubscriptionEngine::connect(transport.clone(), settings(delay))
        .await
        .unwrap();
    let state = engine.state();
    let shutdown = CancellationToken::new();
    let started = Instant::now();
    let task = tokio::spawn(engine.run(CollectingHandler::default(), shutdown.clone()));

    wait_until(|| transport.subscribes().len() == K + 1).await;

    assert!(started.elapsed() >= delay * K as u32);
    assert_eq!(*state.borrow(), EngineState::Subscribed);
    // One initial connect plus one reconnect per lost subscription
    assert_eq!(transport.connects(), 1 + K);

    let subscribes = transport.subscribes();
    for pair in subscribes.windows(2) {
        assert!(pair[1].1 - pair[0].1 >= delay);
        assert_ne!(pair[0].0, pair[1].0, "each cycle subscribes on a new connection");
    }

    shutdown.cancel();
    task.await.unwrap();
    assert_eq!(*state.borrow(), EngineState::Stopped);
}

#[tokio::test]
async fn test_failed_reconnect_is_retried_after_another_delay() {
    let delay = Duration::from_millis(40);
    // initial ok, first reconnect refused, second reconnect ok
    let transport = MockTransport::new(
        vec![true, false, true],
        vec![Session::FailAfter(Vec::new())],
    );

    let engine = SubscriptionEngine::connect(transport.clone(), settings(delay))
        .await
        .unwrap();
    let slot = engine.connection_slot();
    let shutdown = CancellationToken::new();
    let started = Instant::now();
    let task = tokio::spawn(engine.run(CollectingHandler::default(), shutdown.clone()));

    wait_until(|| transport.subscribes().len() == 2).await;

    assert!(started.elapsed() >= delay * 2);
    assert_eq!(transport.connects(), 3);
    let connections: Vec<u32> = transport.subscribes().iter().map(|(c, _)| *c).collect();
    assert_eq!(connections, vec![1, 2]);
    assert_eq!(slot.current().await, Some(2));

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_lock_is_free_during_backoff_and_repaired_connection_is_reused() {
    let delay = Duration::from_millis(300);
    let transport = MockTransport::new(vec![], vec![Session::FailAfter(Vec::new())]);

    let engine = SubscriptionEngine::connect(transport.clone(), settings(delay))
        .await
        .unwrap();
    let slot = engine.connection_slot();
    let mut state = engine.state();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(engine.run(CollectingHandler::default(), shutdown.clone()));

    state
        .wait_for(|s| *s == EngineState::Recovering)
        .await
        .unwrap();

    // The engine is sleeping; the slot must be available and discarded
    let discarded = tokio::time::timeout(Duration::from_millis(100), slot.is_discarded())
        .await
        .expect("connection lock held during backoff");
    assert!(discarded);

    // Another task repairs the connection first
    assert_eq!(slot.install(99).await, None);

    wait_until(|| transport.subscribes().len() == 2).await;

    assert_eq!(transport.subscribes()[1].0, 99);
    assert_eq!(transport.connects(), 1, "no duplicate connection");

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_deliveries_handled_in_order_across_reconnects() {
    let transport = MockTransport::new(
        vec![],
        vec![
            Session::FailAfter(vec![delivery(1), delivery(2)]),
            Session::Hang(vec![delivery(3)]),
        ],
    );

    let engine = SubscriptionEngine::connect(transport.clone(), settings(Duration::from_millis(10)))
        .await
        .unwrap();
    let handler = CollectingHandler::default();
    let seen = handler.seen.clone();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(engine.run(handler, shutdown.clone()));

    wait_until(|| seen.lock().unwrap().len() == 3).await;

    let payloads: Vec<Vec<u8>> = seen.lock().unwrap().iter().map(|d| d.payload.clone()).collect();
    assert_eq!(payloads, vec![vec![1], vec![2], vec![3]]);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_interrupts_backoff() {
    let transport = MockTransport::new(vec![], vec![Session::FailAfter(Vec::new())]);

    let engine = SubscriptionEngine::connect(transport.clone(), settings(Duration::from_secs(60)))
        .await
        .unwrap();
    let mut state = engine.state();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(engine.run(CollectingHandler::default(), shutdown.clone()));

    state
        .wait_for(|s| *s == EngineState::Recovering)
        .await
        .unwrap();
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("engine did not stop during backoff")
        .unwrap();
    assert_eq!(*state.borrow(), EngineState::Stopped);
    assert_eq!(transport.connects(), 1);
}

#[tokio::test]
async fn test_shutdown_while_subscribed_returns_handler() {
    let transport = MockTransport::new(vec![], vec![Session::Hang(vec![delivery(7)])]);

    let engine = SubscriptionEngine::connect(transport.clone(), settings(Duration::from_millis(10)))
        .await
        .unwrap();
    let mut state = engine.state();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(engine.run(CollectingHandler::default(), shutdown.clone()));

    state
        .wait_for(|s| *s == EngineState::Subscribed)
        .await
        .unwrap();
    wait_until(|| transport.subscribes().len() == 1).await;
    shutdown.cancel();

    let handler = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("engine did not stop while subscribed")
        .unwrap();
    assert_eq!(handler.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_engine_writes_partitioned_csv_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("store");
    let clock = ManualClock::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    let writer = PartitionedFileWriter::with_clock(
        &StorageConfig {
            directory: store.to_string_lossy().to_string(),
            file_extension: "csv".to_string(),
        },
        clock,
    );

    let fleet = |vehicle_id: i32| Delivery {
        payload: Fleet {
            vehicle_id,
            coord: Some(Coord {
                lat: 35.681,
                lon: 139.767,
            }),
            angle: 90.0,
            speed: 12,
            status: 0,
        }
        .encode_to_vec(),
        timestamp: Some(Timestamp {
            seconds: 1_709_287_200,
            nanos: 0,
        }),
    };
    let malformed = Delivery {
        payload: vec![0xff, 0xff],
        timestamp: Some(Timestamp::default()),
    };

    let transport = MockTransport::new(
        vec![],
        vec![
            Session::FailAfter(vec![fleet(1), malformed]),
            Session::Hang(vec![fleet(2)]),
        ],
    );

    let engine = SubscriptionEngine::connect(transport.clone(), settings(Duration::from_millis(10)))
        .await
        .unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(engine.run(RecordPipeline::new(writer), shutdown.clone()));

    wait_until(|| transport.subscribes().len() == 2).await;
    // Give the second session time to deliver its record
    let path = store.join("2024-03-01.csv");
    wait_until(|| {
        std::fs::read_to_string(&path)
            .map(|c| c.lines().count() == 2)
            .unwrap_or(false)
    })
    .await;

    shutdown.cancel();
    let pipeline = task.await.unwrap();
    let stats = pipeline.stats();
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.written, 2);
    assert_eq!(stats.decode_failures, 1);

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "2024-03-01T10:00:00Z,1,35.681000,139.767000,90.000000,12\n\
         2024-03-01T10:00:00Z,2,35.681000,139.767000,90.000000,12\n"
    );
}
