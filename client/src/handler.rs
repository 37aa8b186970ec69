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

//! Client event handler traits

use crate::{ChatConnection, ClientError};
use async_trait::async_trait;

/// Client event handler trait
///
/// Implement this trait to handle events from the chat client.
/// All methods are async and have default implementations that do nothing.
///
/// # Example
///
/// ```no_run
/// use parley_client::{ChatConnection, ClientHandler};
/// use async_trait::async_trait;
///
/// struct MyHandler;
///
/// #[async_trait]
/// impl ClientHandler for MyHandler {
///     async fn on_line(&self, _conn: &ChatConnection, line: &str) {
///         println!("{}", line);
///     }
/// }
/// ```
#[async_trait]
pub trait ClientHandler: Send + Sync + 'static {
    /// Called once the username line has been sent
    async fn on_connect(&self, _conn: &ChatConnection) {}

    /// Called for every line received from the server
    ///
    /// Lines are relayed messages (`sender:body`), online user lists or
    /// warnings.
    async fn on_line(&self, _conn: &ChatConnection, _line: &str) {}

    /// Called when reading from the server fails
    ///
    /// The connection will be closed after this method returns.
    async fn on_error(&self, _conn: &ChatConnection, _error: ClientError) {}

    /// Called when the connection is closed, by either side
    async fn on_disconnect(&self, _conn: &ChatConnection) {}
}

/// Handler that writes server lines to the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintingHandler;

#[async_trait]
impl ClientHandler for PrintingHandler {
    async fn on_line(&self, _conn: &ChatConnection, line: &str) {
        println!("{}", line);
    }

    async fn on_error(&self, _conn: &ChatConnection, error: ClientError) {
        eprintln!("Client error: {}", error);
    }

    async fn on_disconnect(&self, conn: &ChatConnection) {
        eprintln!("{} has left the chat.", conn.username());
    }
}
