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

//! Parley chat client
//!
//! ## Usage
//!
//! ```bash
//! parley-client [host] [port]
//! ```
//!
//! Connects to `localhost:8888` by default. Type `quit` to leave.

use parley_client::{ChatClient, ClientConfig, HELP_TEXT, PrintingHandler};
use parley_service::{DEFAULT_PORT, parse_port};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = match parse_port(args.next().as_deref()) {
        Ok(port) => port,
        Err(message) => {
            eprintln!("{}", message);
            DEFAULT_PORT
        }
    };

    match run(ClientConfig::new(host, port)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Client error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    print!("Enter your username: ");
    std::io::stdout().flush()?;
    let username = stdin.next_line().await?.unwrap_or_default();

    let mut client = ChatClient::new(config);
    let conn = client.connect(&username, Arc::new(PrintingHandler)).await?;
    println!("{}", HELP_TEXT);

    while let Some(line) = stdin.next_line().await? {
        if line.eq_ignore_ascii_case("quit") {
            break;
        }
        if let Err(e) = conn.send_line(&line).await {
            eprintln!("Client error: {}", e);
            break;
        }
    }

    if conn.is_connected().await {
        client.disconnect().await?;
    }
    Ok(())
}
