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

//! Client error types

use std::io;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// Connection timeout
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// Connection refused
    #[error("Connection refused")]
    ConnectionRefused,

    /// Connection closed by server
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] LinesCodecError),

    /// Username rejected before connecting
    #[error("Invalid username: {0:?}")]
    InvalidUsername(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

impl From<io::Error> for ClientError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut => Self::ConnectionTimeout,
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe => Self::ConnectionClosed,
            _ => Self::Io(error),
        }
    }
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;
