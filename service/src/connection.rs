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

//! Line-framed transport session

use crate::{ConnectionId, LineCodec, Result};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, error, instrument, trace};

/// Per-connection counters shared with the connection manager
#[derive(Debug, Default)]
pub struct ConnectionStats {
    lines_received: AtomicU64,
    lines_sent: AtomicU64,
}

impl ConnectionStats {
    /// Total lines read from the peer
    pub fn lines_received(&self) -> u64 {
        self.lines_received.load(Ordering::Relaxed)
    }

    /// Total lines written to the peer
    pub fn lines_sent(&self) -> u64 {
        self.lines_sent.load(Ordering::Relaxed)
    }
}

/// A newline-delimited text connection
///
/// The connection is owned by exactly one [`SessionWorker`](crate::SessionWorker),
/// which is its only reader and writer. Dropping it closes the stream.
pub struct LineConnection<S = TcpStream> {
    framed: Framed<S, LineCodec>,
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    created_at: Instant,
    stats: Arc<ConnectionStats>,
    open: bool,
}

impl<S> LineConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap any byte stream in line framing
    pub fn wrap(
        stream: S,
        id: ConnectionId,
        peer_addr: Option<SocketAddr>,
        max_line_length: usize,
    ) -> Self {
        counter!("parley.connections.total").increment(1);
        gauge!("parley.connections.active").increment(1.0);

        Self {
            framed: Framed::new(stream, LineCodec::new(max_line_length)),
            id,
            peer_addr,
            created_at: Instant::now(),
            stats: Arc::new(ConnectionStats::default()),
            open: true,
        }
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Get when the connection was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Get the shared counters
    pub fn stats(&self) -> Arc<ConnectionStats> {
        self.stats.clone()
    }

    /// Receive the next line
    ///
    /// Returns `Ok(None)` once the peer has closed its side. A trailing
    /// partial line before EOF is returned as a final line, and invalid UTF-8
    /// is replaced rather than reported. This method is cancel safe.
    #[instrument(skip(self), fields(connection_id = %self.id))]
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        match self.framed.next().await {
            Some(Ok(line)) => {
                self.stats.lines_received.fetch_add(1, Ordering::Relaxed);
                counter!("parley.lines.received").increment(1);
                trace!(length = line.len(), "Line received");
                Ok(Some(line))
            }
            Some(Err(e)) => {
                counter!("parley.errors.receive").increment(1);
                debug!(error = %e, "Error receiving line");
                Err(e.into())
            }
            None => {
                debug!("Connection stream ended");
                Ok(None)
            }
        }
    }

    /// Send one line; the terminator is appended
    #[instrument(skip(self, line), fields(connection_id = %self.id))]
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let start = Instant::now();
        match self.framed.send(line).await {
            Ok(()) => {
                self.stats.lines_sent.fetch_add(1, Ordering::Relaxed);
                counter!("parley.lines.sent").increment(1);
                histogram!("parley.line.send_duration").record(start.elapsed().as_secs_f64());
                Ok(())
            }
            Err(e) => {
                counter!("parley.errors.send").increment(1);
                error!(error = %e, "Failed to send line");
                Err(e.into())
            }
        }
    }

    /// Flush pending output and shut the stream down
    ///
    /// Closing twice is a no-op.
    #[instrument(skip(self), fields(connection_id = %self.id))]
    pub async fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        gauge!("parley.connections.active").decrement(1.0);
        SinkExt::<&str>::close(&mut self.framed).await?;
        debug!("Connection closed");
        Ok(())
    }
}

impl<S> Drop for LineConnection<S> {
    fn drop(&mut self) {
        if self.open {
            gauge!("parley.connections.active").decrement(1.0);
        }
    }
}

impl<S> std::fmt::Debug for LineConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConnection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("created_at", &self.created_at)
            .field("open", &self.open)
            .finish()
    }
}
