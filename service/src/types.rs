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

//! Core types for the relay service

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Unique identifier for a connection (monotonically increasing, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Session lifecycle state (stored as atomic u8 for lock-free state management)
///
/// A session moves strictly forward:
/// `Connecting → Registering → Active → Closing → Closed`.
/// `Registering` may skip straight to `Closing` when no username arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Transport accepted, worker not yet running
    Connecting = 0,
    /// Waiting for the username line
    Registering = 1,
    /// Registered and routing messages
    Active = 2,
    /// Cleanup in progress
    Closing = 3,
    /// Terminal state
    Closed = 4,
}

impl SessionState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Registering,
            2 => Self::Active,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the session is in a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    /// Check if the session is registered and routing
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Registering => write!(f, "registering"),
            Self::Active => write!(f, "active"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Session information snapshot (for non-blocking queries)
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Connection ID
    pub id: ConnectionId,
    /// Current state
    pub state: SessionState,
    /// Peer address, if the transport has one
    pub peer_addr: Option<SocketAddr>,
    /// When the connection was accepted
    pub created_at: Instant,
    /// Total lines read from the peer
    pub lines_received: u64,
    /// Total lines written to the peer
    pub lines_sent: u64,
}

impl SessionInfo {
    /// Get the session duration
    pub fn duration(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Server snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Number of live sessions
    pub active_connections: usize,
    /// Number of registered usernames
    pub registered_users: usize,
    /// Total connections since server start
    pub total_connections: u64,
    /// Server bind address
    pub bind_address: SocketAddr,
    /// Server uptime
    pub uptime: Duration,
    /// Server start time
    pub started_at: Instant,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RelayServer {{ active: {}, users: {}, total: {}, addr: {}, uptime: {:?} }}",
            self.active_connections,
            self.registered_users,
            self.total_connections,
            self.bind_address,
            self.uptime
        )
    }
}
