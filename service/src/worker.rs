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

//! Session worker implementation
//!
//! The SessionWorker drives a single connection through its lifecycle:
//! - Registration of the username sent on the first line
//! - The receive loop, routing every further line
//! - Delivery of lines queued by other sessions
//! - Cleanup, which runs exactly once on every exit path

use crate::{
    ConnectionId, LineConnection, MessageRouter, RelayError, Registry, Result, ServerHandler,
    ServerMetrics, SessionSink, SessionState,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Control messages for the worker
#[derive(Debug)]
pub enum ControlMessage {
    /// Write a line to the peer
    Deliver(String),
    /// Close the session
    Close,
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Max time to wait for the next inbound line (None waits forever)
    pub idle_timeout: Option<Duration>,
    /// Max time for writing one line
    pub write_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Registry membership of one session
///
/// Dropping the guard unregisters the username, unless a newer session has
/// taken it over in the meantime.
struct Registration {
    registry: Arc<Registry>,
    username: String,
    id: ConnectionId,
}

impl Registration {
    fn new(registry: Arc<Registry>, username: String, sink: SessionSink) -> Self {
        let id = sink.connection_id();
        registry.register(username.clone(), sink);
        Self {
            registry,
            username,
            id,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if !self.registry.unregister_session(&self.username, self.id) {
            debug!(
                connection_id = %self.id,
                username = %self.username,
                "Registration already superseded"
            );
        }
    }
}

/// Outcome of waiting on the peer and the control channel at once
enum Input {
    Line(String),
    Deliver(String),
    Closed,
}

/// Session worker that manages a single connection's lifecycle
pub struct SessionWorker<S> {
    /// Connection ID
    id: ConnectionId,
    /// The connection being managed
    connection: LineConnection<S>,
    /// Routing policy over the shared registry
    router: MessageRouter,
    /// Event hooks
    handler: Arc<dyn ServerHandler>,
    /// Server-wide counters
    metrics: Arc<ServerMetrics>,
    /// Configuration
    config: WorkerConfig,
    /// Current state (atomic for lock-free access)
    state: Arc<AtomicU8>,
    /// Handle other sessions use to reach this one
    sink: SessionSink,
    /// Control message receiver
    control_rx: mpsc::UnboundedReceiver<ControlMessage>,
}

impl<S> SessionWorker<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a new session worker
    ///
    /// Returns the worker and the sink that reaches it.
    pub fn new(
        connection: LineConnection<S>,
        registry: Arc<Registry>,
        handler: Arc<dyn ServerHandler>,
        metrics: Arc<ServerMetrics>,
        config: WorkerConfig,
        state: Arc<AtomicU8>,
    ) -> (Self, SessionSink) {
        let id = connection.id();
        let (sink, control_rx) = SessionSink::channel(id);

        let worker = Self {
            id,
            connection,
            router: MessageRouter::new(registry),
            handler,
            metrics,
            config,
            state,
            sink: sink.clone(),
            control_rx,
        };

        (worker, sink)
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Set the state
    fn set_state(&self, new_state: SessionState) {
        self.state.store(new_state.as_u8(), Ordering::Release);
    }

    /// Run the session until the peer leaves or the session is closed
    pub async fn run(mut self) {
        self.handler
            .on_connect(self.id, self.connection.peer_addr())
            .await;

        self.set_state(SessionState::Registering);
        let registration = match self.register().await {
            Ok(registration) => registration,
            Err(e) => {
                self.report_error(e).await;
                None
            }
        };

        if let Some(registration) = &registration {
            self.set_state(SessionState::Active);
            info!(
                connection_id = %self.id,
                username = %registration.username,
                "Session registered"
            );
            self.handler
                .on_register(self.id, &registration.username)
                .await;

            if let Err(e) = self.event_loop(&registration.username).await {
                self.report_error(e).await;
            }
        }

        self.cleanup(registration).await;
    }

    /// Wait for the username line and register it
    ///
    /// Returns `None` when the peer leaves or sends an empty first line.
    async fn register(&mut self) -> Result<Option<Registration>> {
        match self.next_input().await? {
            Input::Line(username) if !username.is_empty() => Ok(Some(Registration::new(
                self.router.registry().clone(),
                username,
                self.sink.clone(),
            ))),
            Input::Line(_) => {
                debug!(connection_id = %self.id, "Empty username, closing session");
                Ok(None)
            }
            Input::Deliver(_) | Input::Closed => Ok(None),
        }
    }

    /// Main receive loop
    async fn event_loop(&mut self, username: &str) -> Result<()> {
        loop {
            match self.next_input().await? {
                Input::Line(line) => {
                    self.metrics.line_received();
                    let outcome = self.router.route(username, &self.sink, &line);
                    self.metrics.line_routed(&outcome);
                    self.handler
                        .on_message(self.id, username, &line, &outcome)
                        .await;
                }
                Input::Deliver(line) => {
                    timeout(self.config.write_timeout, self.connection.send_line(&line))
                        .await
                        .map_err(|_| RelayError::Timeout)??;
                }
                Input::Closed => return Ok(()),
            }
        }
    }

    /// Wait for whichever comes first: a line from the peer or a control message
    async fn next_input(&mut self) -> Result<Input> {
        let idle_timeout = self.config.idle_timeout;
        let connection = &mut self.connection;
        let control_rx = &mut self.control_rx;
        select! {
            result = async {
                match idle_timeout {
                    Some(limit) => timeout(limit, connection.next_line())
                        .await
                        .unwrap_or(Err(RelayError::Timeout)),
                    None => connection.next_line().await,
                }
            } => {
                Ok(match result? {
                    Some(line) => Input::Line(line),
                    None => Input::Closed,
                })
            }
            msg = control_rx.recv() => {
                Ok(match msg {
                    Some(ControlMessage::Deliver(line)) => Input::Deliver(line),
                    Some(ControlMessage::Close) | None => Input::Closed,
                })
            }
        }
    }

    async fn report_error(&mut self, error: RelayError) {
        match error {
            RelayError::Timeout => {
                debug!(connection_id = %self.id, "Session timed out");
                self.metrics.timeout_error();
                self.handler.on_timeout(self.id).await;
            }
            error => {
                debug!(connection_id = %self.id, error = %error, "Session ended with error");
                self.metrics.connection_error();
                self.handler.on_error(self.id, error).await;
            }
        }
    }

    /// Cleanup resources
    async fn cleanup(&mut self, registration: Option<Registration>) {
        self.set_state(SessionState::Closing);

        let username = registration.as_ref().map(|r| r.username.clone());
        drop(registration);

        while self.control_rx.try_recv().is_ok() {}
        self.control_rx.close();

        // A peer that stopped reading must not pin the session in Closing
        match timeout(self.config.write_timeout, self.connection.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(connection_id = %self.id, error = %e, "Failed to close connection");
            }
            Err(_) => {
                warn!(connection_id = %self.id, "Timed out flushing connection on close");
            }
        }

        self.handler
            .on_disconnect(self.id, username.as_deref())
            .await;

        self.set_state(SessionState::Closed);
    }
}

impl<S> std::fmt::Debug for SessionWorker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWorker")
            .field("id", &self.id)
            .field(
                "state",
                &SessionState::from_u8(self.state.load(Ordering::Acquire)),
            )
            .finish()
    }
}
