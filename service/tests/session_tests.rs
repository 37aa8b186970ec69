//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Session routing tests over in-memory streams

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parley_service::protocol;
use parley_service::{
    ConnectionId, ConnectionManager, Registry, RouteOutcome, ServerHandler, ServerMetrics,
    WorkerConfig,
};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
use tokio::time::{Duration, timeout};
use tokio_util::codec::{Framed, LinesCodec};

type Client = Framed<DuplexStream, LinesCodec>;

/// Handler that records every routing outcome
#[derive(Default)]
struct RecordingHandler {
    outcomes: Mutex<Vec<RouteOutcome>>,
    disconnected: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl ServerHandler for RecordingHandler {
    async fn on_message(
        &self,
        _id: ConnectionId,
        _username: &str,
        _line: &str,
        outcome: &RouteOutcome,
    ) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }

    async fn on_disconnect(&self, _id: ConnectionId, username: Option<&str>) {
        self.disconnected
            .lock()
            .unwrap()
            .push(username.map(str::to_string));
    }
}

struct Relay {
    manager: ConnectionManager,
    registry: Arc<Registry>,
    metrics: Arc<ServerMetrics>,
    handler: Arc<RecordingHandler>,
}

impl Relay {
    fn new() -> Self {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(ServerMetrics::new());
        let manager = ConnectionManager::new(
            registry.clone(),
            metrics.clone(),
            WorkerConfig::default(),
            4096,
        );
        Self {
            manager,
            registry,
            metrics,
            handler: Arc::new(RecordingHandler::default()),
        }
    }

    /// Open a session and register `username` on it
    async fn join(&self, username: &str) -> (ConnectionId, Client) {
        let (server, client) = duplex(8192);
        let id = self
            .manager
            .add_connection(server, None, self.handler.clone())
            .unwrap();
        let mut client = Framed::new(client, LinesCodec::new());
        client.send(username).await.unwrap();
        self.wait_for(|r| r.lookup(username).map(|s| s.connection_id()) == Some(id))
            .await;
        (id, client)
    }

    async fn wait_for(&self, check: impl Fn(&Registry) -> bool) {
        for _ in 0..200 {
            if check(&self.registry) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("registry never reached the expected state");
    }
}

async fn expect_line(client: &mut Client) -> String {
    timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timed out waiting for line")
        .expect("stream ended")
        .expect("codec error")
}

async fn expect_silence(client: &mut Client) {
    assert!(
        timeout(Duration::from_millis(100), client.next())
            .await
            .is_err(),
        "unexpected line"
    );
}

#[tokio::test]
async fn test_direct_message_reaches_recipient_only() {
    let relay = Relay::new();
    let (_, mut alice) = relay.join("alice").await;
    let (_, mut bob) = relay.join("bob").await;

    alice.send("@bob:hello there").await.unwrap();
    assert_eq!(expect_line(&mut bob).await, "alice:hello there");
    expect_silence(&mut alice).await;

    assert_eq!(relay.metrics.snapshot().messages_delivered, 1);
}

#[tokio::test]
async fn test_invalid_utf8_does_not_end_session() {
    let relay = Relay::new();
    let (_, mut alice) = relay.join("alice").await;
    let (_, mut bob) = relay.join("bob").await;

    alice.get_mut().write_all(b"@bob:caf\xe9\n").await.unwrap();
    assert_eq!(expect_line(&mut bob).await, "alice:caf\u{FFFD}");

    alice.send("@bob:still here").await.unwrap();
    assert_eq!(expect_line(&mut bob).await, "alice:still here");
    assert!(relay.registry.contains("alice"));
}

#[tokio::test]
async fn test_warnings_go_back_to_sender() {
    let relay = Relay::new();
    let (_, mut alice) = relay.join("alice").await;

    alice.send("@alice:me").await.unwrap();
    assert_eq!(expect_line(&mut alice).await, protocol::SELF_MESSAGE_WARNING);

    alice.send("@ghost:boo").await.unwrap();
    assert_eq!(
        expect_line(&mut alice).await,
        protocol::user_not_found_warning("ghost")
    );

    alice.send("just chatting").await.unwrap();
    assert_eq!(
        expect_line(&mut alice).await,
        protocol::INVALID_FORMAT_WARNING
    );

    let outcomes = relay.handler.outcomes.lock().unwrap().clone();
    assert!(outcomes.iter().all(RouteOutcome::is_warning));
    assert_eq!(relay.metrics.snapshot().warnings_sent, 3);
}

#[tokio::test]
async fn test_online_users_lists_others() {
    let relay = Relay::new();
    let (_, mut alice) = relay.join("alice").await;
    let (_, _bob) = relay.join("bob").await;
    let (_, _carol) = relay.join("carol").await;

    alice.send("online users").await.unwrap();
    let line = expect_line(&mut alice).await;
    let mut names: Vec<&str> = line.split(protocol::USER_LIST_SEPARATOR).collect();
    names.sort();
    assert_eq!(names, vec!["bob", "carol"]);
}

#[tokio::test]
async fn test_online_users_alone_is_empty_line() {
    let relay = Relay::new();
    let (_, mut alice) = relay.join("alice").await;

    alice.send("who is in online users?").await.unwrap();
    assert_eq!(expect_line(&mut alice).await, "");
}

#[tokio::test]
async fn test_newer_session_supersedes_older() {
    let relay = Relay::new();
    let (old_id, mut old) = relay.join("alice").await;
    let (new_id, mut new) = relay.join("alice").await;
    let (_, mut bob) = relay.join("bob").await;
    assert_ne!(old_id, new_id);

    bob.send("@alice:which one?").await.unwrap();
    assert_eq!(expect_line(&mut new).await, "bob:which one?");
    expect_silence(&mut old).await;

    // The superseded session leaving must not evict the newer one
    drop(old);
    relay
        .wait_for(|_| relay.manager.get_session_info(old_id).is_none())
        .await;
    assert_eq!(
        relay.registry.lookup("alice").map(|s| s.connection_id()),
        Some(new_id)
    );
}

#[tokio::test]
async fn test_disconnect_removes_username() {
    let relay = Relay::new();
    let (_, alice) = relay.join("alice").await;
    let (_, mut bob) = relay.join("bob").await;

    drop(alice);
    relay.wait_for(|r| !r.contains("alice")).await;

    bob.send("@alice:still there?").await.unwrap();
    assert_eq!(
        expect_line(&mut bob).await,
        protocol::user_not_found_warning("alice")
    );

    relay
        .wait_for(|_| relay.handler.disconnected.lock().unwrap().len() == 1)
        .await;
    assert_eq!(
        relay.handler.disconnected.lock().unwrap()[0].as_deref(),
        Some("alice")
    );
}

#[tokio::test]
async fn test_delivery_to_closing_session_is_dropped() {
    let relay = Relay::new();
    let (alice_id, _alice) = relay.join("alice").await;
    let (_, mut bob) = relay.join("bob").await;

    // Keep a stale handle to alice, then close alice's session
    let stale = relay.registry.lookup("alice").unwrap();
    relay
        .manager
        .remove_connection(alice_id, Duration::from_secs(1))
        .await
        .unwrap();
    assert!(stale.is_closed());
    assert!(stale.deliver("late").is_err());

    // Bob keeps working
    bob.send("online users").await.unwrap();
    assert_eq!(expect_line(&mut bob).await, "");
}

#[tokio::test]
async fn test_session_without_username_never_registers() {
    let relay = Relay::new();
    let (server, client) = duplex(1024);
    relay
        .manager
        .add_connection(server, None, relay.handler.clone())
        .unwrap();
    drop(client);

    relay
        .wait_for(|_| relay.manager.connection_count() == 0)
        .await;
    assert!(relay.registry.is_empty());
    assert_eq!(
        relay.handler.disconnected.lock().unwrap().as_slice(),
        &[None]
    );
}
