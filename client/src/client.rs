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

//! Chat client implementation

use crate::{ClientConfig, ClientError, ClientHandler, Result};
use futures_util::{SinkExt, StreamExt};
use parley_service::protocol;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, info, instrument, warn};

/// Usage banner shown after registering
pub const HELP_TEXT: &str = "\
--------------------------------------------------
Help:
--------------------------------------------------
->Type: 'online users' to check all the active users.
->Accepted Message Format:[@<recipientUsername>: <Your Message>]";

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connecting to server
    Connecting,
    /// Connected and registered
    Connected,
    /// Shutting down
    ShuttingDown,
}

/// Handle to a registered chat connection
///
/// Cloning is cheap; all clones share the same socket.
#[derive(Clone)]
pub struct ChatConnection {
    inner: Arc<ChatConnectionInner>,
}

struct ChatConnectionInner {
    config: ClientConfig,
    username: String,
    state: RwLock<ConnectionState>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LinesCodec>>,
}

impl ChatConnection {
    fn new(
        config: ClientConfig,
        username: String,
        writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
    ) -> Self {
        Self {
            inner: Arc::new(ChatConnectionInner {
                config,
                username,
                state: RwLock::new(ConnectionState::Connecting),
                writer: Mutex::new(writer),
            }),
        }
    }

    /// Get the username this connection registered
    pub fn username(&self) -> &str {
        &self.inner.username
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        *self.inner.state.read().await == ConnectionState::Connected
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.inner.state.write().await = state;
    }

    /// Send one raw line to the server
    ///
    /// The line terminator is added by the codec.
    pub async fn send_line(&self, line: &str) -> Result<()> {
        if !matches!(
            self.state().await,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return Err(ClientError::NotConnected);
        }
        self.inner.writer.lock().await.send(line).await?;
        Ok(())
    }

    /// Send `body` to `recipient`
    pub async fn send_direct(&self, recipient: &str, body: &str) -> Result<()> {
        self.send_line(&format!("@{}:{}", recipient, body)).await
    }

    /// Ask the server who else is online
    pub async fn request_online_users(&self) -> Result<()> {
        self.send_line(protocol::ONLINE_USERS_TRIGGER).await
    }

    /// Close the sending side; the server then ends the session
    pub async fn disconnect(&self) -> Result<()> {
        self.set_state(ConnectionState::ShuttingDown).await;
        let mut writer = self.inner.writer.lock().await;
        SinkExt::<&str>::close(&mut *writer).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ChatConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConnection")
            .field("address", &self.inner.config.address())
            .field("username", &self.inner.username)
            .finish()
    }
}

/// Chat relay client
///
/// # Example
///
/// ```no_run
/// use parley_client::{ChatClient, ClientConfig, PrintingHandler};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = ChatClient::new(ClientConfig::new("localhost", 8888));
///     let conn = client.connect("alice", Arc::new(PrintingHandler)).await?;
///
///     conn.send_direct("bob", "hello").await?;
///     client.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct ChatClient {
    config: ClientConfig,
    connection: Option<ChatConnection>,
    reader_handle: Option<JoinHandle<()>>,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connection: None,
            reader_handle: None,
        }
    }

    /// Connect, register `username` and start delivering server lines to `handler`
    #[instrument(skip(self, handler), fields(address = %self.config.address()))]
    pub async fn connect<H: ClientHandler>(
        &mut self,
        username: &str,
        handler: Arc<H>,
    ) -> Result<ChatConnection> {
        if username.is_empty() || username.contains(['\r', '\n']) {
            return Err(ClientError::InvalidUsername(username.to_string()));
        }

        let addr = self.config.address();
        info!("Connecting to {}...", addr);

        let stream = match timeout(self.config.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ClientError::ConnectionTimeout),
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        info!("Connected to {}", stream.peer_addr()?);

        let (read_half, write_half) = stream.into_split();
        let codec = LinesCodec::new_with_max_length(self.config.max_line_length);
        let reader = FramedRead::new(read_half, codec.clone());
        let writer = FramedWrite::new(write_half, codec);

        let connection = ChatConnection::new(self.config.clone(), username.to_string(), writer);
        connection.send_line(username).await?;
        connection.set_state(ConnectionState::Connected).await;
        handler.on_connect(&connection).await;

        self.reader_handle = Some(tokio::spawn(read_loop(
            connection.clone(),
            reader,
            handler,
        )));
        self.connection = Some(connection.clone());

        Ok(connection)
    }

    pub fn connection(&self) -> Option<&ChatConnection> {
        self.connection.as_ref()
    }

    /// Disconnect and wait for the reader to observe the close
    pub async fn disconnect(&mut self) -> Result<()> {
        let connection = self.connection.take().ok_or(ClientError::NotConnected)?;
        connection.disconnect().await?;

        if let Some(mut handle) = self.reader_handle.take() {
            if timeout(Duration::from_secs(5), &mut handle).await.is_err() {
                warn!("Server did not close the connection, aborting reader");
                handle.abort();
            }
        }
        Ok(())
    }

    /// Wait until the server closes the connection
    pub async fn wait(&mut self) {
        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.await;
        }
    }
}

async fn read_loop<H: ClientHandler>(
    connection: ChatConnection,
    mut reader: FramedRead<OwnedReadHalf, LinesCodec>,
    handler: Arc<H>,
) {
    loop {
        match reader.next().await {
            Some(Ok(line)) => handler.on_line(&connection, &line).await,
            Some(Err(e)) => {
                error!("Connection error: {}", e);
                handler.on_error(&connection, e.into()).await;
                break;
            }
            None => {
                info!("Server closed connection");
                break;
            }
        }
    }

    connection.set_state(ConnectionState::Disconnected).await;
    handler.on_disconnect(&connection).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_util::codec::Framed;

    #[derive(Default)]
    struct Collector {
        lines: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ClientHandler for Collector {
        async fn on_line(&self, _conn: &ChatConnection, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn test_empty_username_rejected() {
        let mut client = ChatClient::new(ClientConfig::default());
        let result = client.connect("", Arc::new(Collector::default())).await;
        assert!(matches!(result, Err(ClientError::InvalidUsername(_))));
        assert!(client.connection().is_none());
    }

    #[tokio::test]
    async fn test_connect_sends_username_first() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, LinesCodec::new());
            let username = framed.next().await.unwrap().unwrap();
            let request = framed.next().await.unwrap().unwrap();
            framed.send("bob, carol").await.unwrap();
            (username, request)
        });

        let handler = Arc::new(Collector::default());
        let mut client = ChatClient::new(ClientConfig::new("127.0.0.1", port));
        let conn = client.connect("alice", handler.clone()).await.unwrap();
        assert!(conn.is_connected().await);
        conn.request_online_users().await.unwrap();

        let (username, request) = server.await.unwrap();
        assert_eq!(username, "alice");
        assert_eq!(request, "online users");

        // Server task dropped its socket, so the reader sees EOF
        client.wait().await;
        assert_eq!(*handler.lines.lock().unwrap(), vec!["bob, carol".to_string()]);
        assert_eq!(conn.state().await, ConnectionState::Disconnected);
        assert!(matches!(
            conn.send_line("late").await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_send_direct_format() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, LinesCodec::new());
            let mut lines = Vec::new();
            while let Some(Ok(line)) = framed.next().await {
                lines.push(line);
            }
            lines
        });

        let mut client = ChatClient::new(ClientConfig::new("127.0.0.1", port));
        let conn = client
            .connect("alice", Arc::new(Collector::default()))
            .await
            .unwrap();
        conn.send_direct("bob", " hi: there").await.unwrap();
        client.disconnect().await.unwrap();

        assert_eq!(
            server.await.unwrap(),
            vec!["alice".to_string(), "@bob: hi: there".to_string()]
        );
    }
}
