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

//! Session event hooks

use crate::{ConnectionId, RelayError, RouteOutcome};
use async_trait::async_trait;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Server event handler trait
///
/// Routing is done by the server itself; a handler only observes the
/// lifecycle of each session. All methods have default implementations that
/// do nothing.
///
/// # Example
///
/// ```no_run
/// use parley_service::{ConnectionId, ServerHandler};
/// use async_trait::async_trait;
///
/// struct Greeter;
///
/// #[async_trait]
/// impl ServerHandler for Greeter {
///     async fn on_register(&self, id: ConnectionId, username: &str) {
///         println!("{} joined as {}", id, username);
///     }
/// }
/// ```
#[async_trait]
pub trait ServerHandler: Send + Sync + 'static {
    /// Called when the worker for a new connection starts
    async fn on_connect(&self, _id: ConnectionId, _peer_addr: Option<SocketAddr>) {}

    /// Called once the username line has been registered
    async fn on_register(&self, _id: ConnectionId, _username: &str) {}

    /// Called after every routed line
    async fn on_message(
        &self,
        _id: ConnectionId,
        _username: &str,
        _line: &str,
        _outcome: &RouteOutcome,
    ) {
    }

    /// Called when a session ends because of an error
    ///
    /// The session will be closed after this method returns.
    async fn on_error(&self, _id: ConnectionId, _error: RelayError) {}

    /// Called when a session exceeds its idle timeout
    ///
    /// The session will be closed after this method returns.
    async fn on_timeout(&self, _id: ConnectionId) {}

    /// Called after cleanup, with the username if the session had registered
    async fn on_disconnect(&self, _id: ConnectionId, _username: Option<&str>) {}
}

/// Handler that reports session lifecycle in the server log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

#[async_trait]
impl ServerHandler for LoggingHandler {
    async fn on_register(&self, id: ConnectionId, username: &str) {
        info!(connection_id = %id, "{} is available for chat.", username);
    }

    async fn on_message(
        &self,
        id: ConnectionId,
        username: &str,
        line: &str,
        outcome: &RouteOutcome,
    ) {
        info!(
            connection_id = %id,
            username = %username,
            outcome = ?outcome,
            "Processing message: {}",
            line
        );
    }

    async fn on_error(&self, id: ConnectionId, error: RelayError) {
        warn!(connection_id = %id, "Error handling client: {}", error);
    }

    async fn on_disconnect(&self, id: ConnectionId, username: Option<&str>) {
        if let Some(username) = username {
            info!(connection_id = %id, "{} has disconnected.", username);
        }
    }
}
