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

//! Parley chat relay server
//!
//! ## Usage
//!
//! ```bash
//! parley-server [port]
//! ```
//!
//! The port defaults to 8888. Set `RUST_LOG` to adjust log verbosity.

use parley_service::{DEFAULT_PORT, LoggingHandler, RelayServer, ServerConfig, parse_port};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let port = match parse_port(std::env::args().nth(1).as_deref()) {
        Ok(port) => port,
        Err(message) => {
            warn!("{}", message);
            DEFAULT_PORT
        }
    };

    let server = match RelayServer::new(ServerConfig::default().with_port(port)).await {
        Ok(server) => server,
        Err(e) => {
            error!("Unable to start chat server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.start(Arc::new(LoggingHandler)).await {
        error!("Unable to start chat server: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", e);
    }

    info!("Received shutdown signal");
    if let Err(e) = server.shutdown().await {
        error!("Shutdown failed: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
