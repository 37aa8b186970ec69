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

//! # Parley Chat Client
//!
//! Client library for the Parley chat relay. A client connects, registers a
//! username with its first line and then exchanges newline-delimited text
//! with the server.
//!
//! ## Quick Start
//!
//! ```no_run
//! use parley_client::{ChatClient, ChatConnection, ClientConfig, ClientHandler};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct MyHandler;
//!
//! #[async_trait]
//! impl ClientHandler for MyHandler {
//!     async fn on_line(&self, _conn: &ChatConnection, line: &str) {
//!         println!("{}", line);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = ChatClient::new(ClientConfig::new("localhost", 8888));
//!     let conn = client.connect("alice", Arc::new(MyHandler)).await?;
//!
//!     conn.request_online_users().await?;
//!     conn.send_direct("bob", "hello").await?;
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod handler;

pub use client::{ChatClient, ChatConnection, ConnectionState, HELP_TEXT};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use handler::{ClientHandler, PrintingHandler};
