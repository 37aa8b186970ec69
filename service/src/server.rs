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

//! Relay server implementation
//!
//! The RelayServer is the main entry point of the service. It owns the TCP
//! listener and the shared registry, accepts connections and hands each one
//! to the ConnectionManager.

use crate::{
    ConnectionManager, Registry, RelayError, Result, ServerConfig, ServerHandler, ServerMetrics,
    ServerSnapshot, WorkerConfig,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

/// Chat relay server
///
/// # Example
///
/// ```no_run
/// use parley_service::{LoggingHandler, RelayServer, ServerConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = RelayServer::new(ServerConfig::default()).await?;
///     server.start(Arc::new(LoggingHandler)).await?;
///
///     tokio::signal::ctrl_c().await?;
///     server.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct RelayServer {
    /// Server configuration
    config: ServerConfig,
    /// Connection manager
    manager: Arc<ConnectionManager>,
    /// Username directory
    registry: Arc<Registry>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// TCP listener, taken by the accept loop on start
    listener: Mutex<Option<TcpListener>>,
    /// Actual bind address
    bind_address: SocketAddr,
    /// Server start time
    started_at: Instant,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Shutdown notification
    shutdown_notify: Arc<Notify>,
    /// Accept loop task handle
    accept_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    ///
    /// This binds to the configured address but does not start accepting
    /// connections. Call `start()` to begin accepting connections. Failing to
    /// bind is fatal and reported as [`RelayError::Bind`].
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate().map_err(RelayError::InvalidConfig)?;

        let listener = TcpListener::bind(config.bind_address)
            .await
            .map_err(|source| RelayError::Bind {
                address: config.bind_address,
                source,
            })?;
        let actual_addr = listener.local_addr()?;

        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(ServerMetrics::new());
        let worker_config = WorkerConfig {
            idle_timeout: config.idle_timeout,
            write_timeout: config.write_timeout,
        };
        let manager = Arc::new(
            ConnectionManager::new(
                registry.clone(),
                metrics.clone(),
                worker_config,
                config.max_line_length,
            )
            .with_max_connections(config.max_connections),
        );

        tracing::info!("Chat server bound to {}", actual_addr);

        Ok(Self {
            config,
            manager,
            registry,
            metrics,
            listener: Mutex::new(Some(listener)),
            bind_address: actual_addr,
            started_at: Instant::now(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            accept_handle: Mutex::new(None),
        })
    }

    /// Start the server with the given handler
    ///
    /// This spawns the accept loop and returns immediately. A server can be
    /// started once.
    pub async fn start(&self, handler: Arc<dyn ServerHandler>) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or(RelayError::ServerAlreadyRunning)?;
        self.running.store(true, Ordering::SeqCst);

        tracing::info!("Chat server started on port {}", self.bind_address.port());

        let handle = self.spawn_accept_loop(listener, handler);
        *self.accept_handle.lock().await = Some(handle);

        Ok(())
    }

    /// Spawn the accept loop task
    fn spawn_accept_loop(
        &self,
        listener: TcpListener,
        handler: Arc<dyn ServerHandler>,
    ) -> JoinHandle<()> {
        let manager = self.manager.clone();
        let metrics = self.metrics.clone();
        let running = self.running.clone();
        let shutdown_notify = self.shutdown_notify.clone();

        tokio::spawn(async move {
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let accept_result = tokio::select! {
                    result = listener.accept() => result,
                    _ = shutdown_notify.notified() => break,
                };

                match accept_result {
                    Ok((socket, peer_addr)) => {
                        tracing::debug!("Accepted connection from {}", peer_addr);

                        if let Err(e) = socket.set_nodelay(true) {
                            tracing::debug!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
                        }

                        match manager.add_connection(socket, Some(peer_addr), handler.clone()) {
                            Ok(id) => {
                                tracing::info!("Connection {} established from {}", id, peer_addr);
                            }
                            Err(e @ RelayError::MaxConnectionsReached(_)) => {
                                tracing::warn!("{}, rejecting connection from {}", e, peer_addr);
                                metrics.connection_error();
                            }
                            Err(e) => {
                                tracing::error!("Failed to add connection: {}", e);
                                metrics.connection_error();
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                        metrics.connection_error();

                        // Back off on errors to avoid tight loop
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }

            tracing::info!("Accept loop terminated");
        })
    }

    /// Shutdown the server gracefully
    ///
    /// This stops accepting new connections, closes every session and waits
    /// up to the configured shutdown timeout for their cleanup.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(RelayError::ServerNotRunning);
        }

        tracing::info!("Shutting down chat server");

        self.shutdown_notify.notify_waiters();

        if let Some(mut handle) = self.accept_handle.lock().await.take() {
            if tokio::time::timeout(Duration::from_secs(5), &mut handle)
                .await
                .is_err()
            {
                tracing::warn!("Accept loop did not stop in time, aborting");
                handle.abort();
            }
        }

        self.manager.shutdown(self.config.shutdown_timeout).await;

        tracing::info!("Chat server shutdown complete");

        Ok(())
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the server's bind address
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get the number of live sessions
    pub fn connection_count(&self) -> usize {
        self.manager.connection_count()
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            active_connections: self.manager.connection_count(),
            registered_users: self.registry.len(),
            total_connections: self.metrics.total_connections(),
            bind_address: self.bind_address(),
            uptime: self.started_at.elapsed(),
            started_at: self.started_at,
        }
    }

    /// Get the shared username registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Get the connection manager
    pub fn manager(&self) -> Arc<ConnectionManager> {
        self.manager.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayServer")
            .field("bind_address", &self.bind_address())
            .field("running", &self.is_running())
            .field("connection_count", &self.connection_count())
            .field("registered_users", &self.registry.len())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!("RelayServer dropped while still running");
            self.running.store(false, Ordering::SeqCst);
            self.shutdown_notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerHandler;
    use async_trait::async_trait;

    struct TestHandler;

    #[async_trait]
    impl ServerHandler for TestHandler {}

    fn local_config() -> ServerConfig {
        ServerConfig::new("127.0.0.1:0".parse().unwrap())
    }

    #[tokio::test]
    async fn test_server_lifecycle() {
        let server = RelayServer::new(local_config()).await.unwrap();
        assert!(!server.is_running());

        server.start(Arc::new(TestHandler)).await.unwrap();
        assert!(server.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;

        server.shutdown().await.unwrap();
        assert!(!server.is_running());
        assert!(server.shutdown().await.is_err());
    }

    #[tokio::test]
    async fn test_server_snapshot() {
        let server = RelayServer::new(local_config()).await.unwrap();
        let snapshot = server.snapshot();

        assert_eq!(snapshot.active_connections, 0);
        assert_eq!(snapshot.registered_users, 0);
        assert_eq!(snapshot.total_connections, 0);
        assert_ne!(snapshot.bind_address.port(), 0);
    }

    #[tokio::test]
    async fn test_server_double_start() {
        let server = RelayServer::new(local_config()).await.unwrap();
        server.start(Arc::new(TestHandler)).await.unwrap();

        let result = server.start(Arc::new(TestHandler)).await;
        assert!(matches!(result, Err(RelayError::ServerAlreadyRunning)));

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let first = RelayServer::new(local_config()).await.unwrap();
        let taken = ServerConfig::new(first.bind_address());

        let result = RelayServer::new(taken).await;
        assert!(matches!(result, Err(RelayError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = local_config().with_max_connections(0);
        assert!(matches!(
            RelayServer::new(config).await,
            Err(RelayError::InvalidConfig(_))
        ));
    }
}
