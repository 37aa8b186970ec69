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

//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port used when none (or an unparsable one) is supplied
pub const DEFAULT_PORT: u16 = 8888;

/// Parse a port argument
///
/// Returns [`DEFAULT_PORT`] when the argument is absent, and an error message
/// describing the fallback when it is present but not a valid port. Callers
/// decide whether to report that message and continue with the default.
///
/// # Example
///
/// ```
/// use parley_service::{DEFAULT_PORT, parse_port};
///
/// assert_eq!(parse_port(Some("9000")), Ok(9000));
/// assert_eq!(parse_port(None), Ok(DEFAULT_PORT));
/// assert!(parse_port(Some("http")).is_err());
/// ```
pub fn parse_port(arg: Option<&str>) -> Result<u16, String> {
    match arg {
        None => Ok(DEFAULT_PORT),
        Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
            format!(
                "The entered port '{}' is invalid. The default port {} will be used.",
                raw, DEFAULT_PORT
            )
        }),
    }
}

/// Server configuration
///
/// Use the builder pattern methods to customize the configuration.
///
/// # Example
///
/// ```
/// use parley_service::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::default()
///     .with_port(9000)
///     .with_max_connections(500)
///     .with_idle_timeout(Some(Duration::from_secs(600)));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Close sessions that stay silent this long (None waits forever)
    pub idle_timeout: Option<Duration>,

    /// Timeout for writing a single line to a peer
    pub write_timeout: Duration,

    /// How long `shutdown()` waits for sessions to finish cleanup
    pub shutdown_timeout: Duration,

    /// Longest accepted inbound line in bytes
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 1024,
            idle_timeout: None,
            write_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            max_line_length: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Keep the bind IP and replace the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_address.set_port(port);
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the idle timeout duration
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the write timeout duration
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the shutdown timeout duration
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the maximum inbound line length
    pub fn with_max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length;
        self
    }

    /// Validate the configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err("idle_timeout must be greater than 0".to_string());
        }

        if self.write_timeout.is_zero() {
            return Err("write_timeout must be greater than 0".to_string());
        }

        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be greater than 0".to_string());
        }

        if self.max_line_length == 0 {
            return Err("max_line_length must be greater than 0".to_string());
        }

        Ok(())
    }
}
