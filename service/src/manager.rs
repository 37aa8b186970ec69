//
// Copyright 2017-2025 Hans W. Uhlig. All Rights Reserved.
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

//! Connection manager implementation
//!
//! The ConnectionManager is responsible for:
//! - Allocating connection IDs
//! - Spawning and tracking session workers
//! - Closing individual sessions on request
//! - Graceful shutdown coordination

use crate::{
    ConnectionId, ConnectionStats, LineConnection, RelayError, Registry, Result, ServerHandler,
    ServerMetrics, SessionInfo, SessionSink, SessionState, SessionWorker, WorkerConfig,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Managed session entry
struct ManagedSession {
    /// Connection ID
    id: ConnectionId,
    /// Peer address
    peer_addr: Option<SocketAddr>,
    /// Control handle of the worker
    sink: SessionSink,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
    /// Current state (atomic for lock-free access)
    state: Arc<AtomicU8>,
    /// Line counters of the connection
    stats: Arc<ConnectionStats>,
    /// When the connection was accepted
    created_at: Instant,
}

impl ManagedSession {
    /// Get the current state
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Get session info snapshot
    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            state: self.state(),
            peer_addr: self.peer_addr,
            created_at: self.created_at,
            lines_received: self.stats.lines_received(),
            lines_sent: self.stats.lines_sent(),
        }
    }
}

/// Connection manager
pub struct ConnectionManager {
    /// Live sessions (lock-free concurrent map)
    sessions: Arc<DashMap<ConnectionId, ManagedSession>>,
    /// Next connection ID (monotonically increasing)
    next_id: AtomicU64,
    /// Username directory shared by all workers
    registry: Arc<Registry>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Worker configuration
    worker_config: WorkerConfig,
    /// Longest accepted inbound line
    max_line_length: usize,
    /// Session limit enforced by `add_connection`
    max_connections: usize,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(
        registry: Arc<Registry>,
        metrics: Arc<ServerMetrics>,
        worker_config: WorkerConfig,
        max_line_length: usize,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            registry,
            metrics,
            worker_config,
            max_line_length,
            max_connections: usize::MAX,
        }
    }

    /// Limit the number of live sessions
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Get the next connection ID
    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the shared registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Start a session on an accepted stream
    ///
    /// This wraps the stream, spawns a worker task for it and tracks it until
    /// the worker finishes. When the session limit is reached the stream is
    /// dropped and [`RelayError::MaxConnectionsReached`] is returned.
    pub fn add_connection<S>(
        &self,
        stream: S,
        peer_addr: Option<SocketAddr>,
        handler: Arc<dyn ServerHandler>,
    ) -> Result<ConnectionId>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        if self.sessions.len() >= self.max_connections {
            return Err(RelayError::MaxConnectionsReached(self.max_connections));
        }

        let id = self.next_connection_id();
        let connection = LineConnection::wrap(stream, id, peer_addr, self.max_line_length);
        let stats = connection.stats();
        let state = Arc::new(AtomicU8::new(SessionState::Connecting.as_u8()));

        let (worker, sink) = SessionWorker::new(
            connection,
            self.registry.clone(),
            handler,
            self.metrics.clone(),
            self.worker_config.clone(),
            state.clone(),
        );

        // The worker waits for `tracked` so it cannot finish (and remove
        // itself) before it has been inserted.
        let (tracked_tx, tracked_rx) = oneshot::channel::<()>();
        let sessions = self.sessions.clone();
        let metrics = self.metrics.clone();
        let worker_handle = tokio::spawn(async move {
            let _ = tracked_rx.await;
            let start = Instant::now();
            worker.run().await;

            sessions.remove(&id);
            metrics.connection_closed(start.elapsed());
            debug!(connection_id = %id, "Session worker finished");
        });

        self.sessions.insert(
            id,
            ManagedSession {
                id,
                peer_addr,
                sink,
                worker_handle,
                state,
                stats,
                created_at: Instant::now(),
            },
        );
        self.metrics.connection_opened();
        let _ = tracked_tx.send(());

        Ok(id)
    }

    /// Close a session and wait for its cleanup
    pub async fn remove_connection(&self, id: ConnectionId, wait: Duration) -> Result<()> {
        if let Some((_, managed)) = self.sessions.remove(&id) {
            // Best effort; the worker may already be closing
            let _ = managed.sink.close();

            if tokio::time::timeout(wait, managed.worker_handle)
                .await
                .is_err()
            {
                warn!(connection_id = %id, "Session did not close in time");
            }
            Ok(())
        } else {
            Err(RelayError::ConnectionNotFound(id))
        }
    }

    /// Get session info
    pub fn get_session_info(&self, id: ConnectionId) -> Option<SessionInfo> {
        self.sessions.get(&id).map(|entry| entry.info())
    }

    /// Get all connection IDs
    pub fn get_connection_ids(&self) -> Vec<ConnectionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    /// Get all session infos
    pub fn get_all_session_infos(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| entry.value().info())
            .collect()
    }

    /// Get the number of live sessions
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Close every session and wait up to `wait` for their cleanup
    pub async fn shutdown(&self, wait: Duration) {
        let ids = self.get_connection_ids();
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, managed)) = self.sessions.remove(&id) {
                let _ = managed.sink.close();
                handles.push(managed.worker_handle);
            }
        }

        let count = handles.len();
        if tokio::time::timeout(wait, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(sessions = count, "Timed out waiting for sessions to close");
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_count", &self.connection_count())
            .field("registered_users", &self.registry.len())
            .field("max_connections", &self.max_connections)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
