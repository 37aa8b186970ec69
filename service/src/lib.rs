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

//! Parley Chat Relay Service
//!
//! This crate provides the server side of a line-oriented chat relay. Clients
//! connect over TCP, declare a username on their first line and then exchange
//! direct messages of the form `@recipient:message`, or ask for the list of
//! other users currently online.
//!
//! # Architecture
//!
//! ```text
//! RelayServer (accept loop)
//!     ↓
//! ConnectionManager
//!     ↓
//! SessionWorker → LineConnection
//!     ↓
//! MessageRouter → Registry → SessionSink
//! ```
//!
//! Every accepted connection is driven by its own [`SessionWorker`] task. The
//! worker is the only writer of its socket; other sessions reach it through a
//! [`SessionSink`] looked up in the shared [`Registry`].
//!
//! # Example
//!
//! ```no_run
//! use parley_service::{LoggingHandler, RelayServer, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default().with_port(8888);
//!     let server = RelayServer::new(config).await?;
//!     server.start(Arc::new(LoggingHandler)).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod codec;
mod config;
mod connection;
mod error;
mod handler;
mod manager;
mod metrics;
pub mod protocol;
mod registry;
mod router;
mod server;
mod sink;
mod types;
mod worker;

pub use codec::LineCodec;
pub use config::{DEFAULT_PORT, ServerConfig, parse_port};
pub use connection::{ConnectionStats, LineConnection};
pub use error::{RelayError, Result};
pub use handler::{LoggingHandler, ServerHandler};
pub use manager::ConnectionManager;
pub use self::metrics::{MetricsSnapshot, ServerMetrics};
pub use protocol::Command;
pub use registry::Registry;
pub use router::{MessageRouter, RouteOutcome};
pub use server::RelayServer;
pub use sink::SessionSink;
pub use types::{ConnectionId, ServerSnapshot, SessionInfo, SessionState};
pub use worker::{ControlMessage, SessionWorker, WorkerConfig};
