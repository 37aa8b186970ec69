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

//! Error types for the relay service

use crate::types::ConnectionId;
use std::net::SocketAddr;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Relay service error types
#[derive(Debug, Error)]
pub enum RelayError {
    /// I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (oversized line or I/O failure)
    #[error("Codec error: {0}")]
    Codec(#[from] LinesCodecError),

    /// The listening endpoint could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Requested bind address
        address: SocketAddr,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Connection with the given ID was not found
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// The session behind a sink has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server was started twice
    #[error("Server already running")]
    ServerAlreadyRunning,

    /// Maximum number of connections reached
    #[error("Maximum connections ({0}) reached")]
    MaxConnectionsReached(usize),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RelayError {
    /// Check if the error is recoverable
    ///
    /// Recoverable errors end at most a single session and never the server.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RelayError::Timeout
                | RelayError::ConnectionClosed
                | RelayError::Io(_)
                | RelayError::Codec(_)
        )
    }

    /// Check if the error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RelayError::ConnectionNotFound(_)
                | RelayError::ConnectionClosed
                | RelayError::Io(_)
                | RelayError::Codec(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_recoverable() {
        assert!(RelayError::Timeout.is_recoverable());
        assert!(RelayError::ConnectionClosed.is_recoverable());
        assert!(RelayError::Codec(LinesCodecError::MaxLineLengthExceeded).is_recoverable());
        assert!(!RelayError::ServerNotRunning.is_recoverable());
        assert!(!RelayError::MaxConnectionsReached(100).is_recoverable());
    }

    #[test]
    fn test_error_is_connection_error() {
        assert!(RelayError::ConnectionNotFound(ConnectionId::new(1)).is_connection_error());
        assert!(RelayError::ConnectionClosed.is_connection_error());
        assert!(!RelayError::Timeout.is_connection_error());
        assert!(!RelayError::InvalidConfig("bad".into()).is_connection_error());
    }

    #[test]
    fn test_error_display() {
        let err = RelayError::ConnectionNotFound(ConnectionId::new(42));
        assert_eq!(err.to_string(), "Connection conn-42 not found");

        let err = RelayError::MaxConnectionsReached(1000);
        assert_eq!(err.to_string(), "Maximum connections (1000) reached");

        let err = RelayError::Bind {
            address: "127.0.0.1:8888".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("Failed to bind 127.0.0.1:8888"));
    }
}
