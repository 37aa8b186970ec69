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

//! Message routing
//!
//! The router turns one inbound line from a registered user into at most one
//! outbound line: either a delivery to another user or a reply to the sender.

use crate::protocol::{self, Command};
use crate::{Registry, SessionSink};
use std::sync::Arc;
use tracing::{debug, trace};

/// What the router did with a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The line was queued on the recipient's sink
    Delivered {
        /// Recipient username
        recipient: String,
    },
    /// The recipient was registered but its session had already gone
    RecipientGone {
        /// Recipient username
        recipient: String,
    },
    /// Nobody is registered under the recipient name
    RecipientNotFound {
        /// Recipient username
        recipient: String,
    },
    /// The sender addressed itself
    SelfMessage,
    /// The sender asked for the online users
    OnlineUsers {
        /// Number of names in the reply
        count: usize,
    },
    /// The line matched no command
    InvalidFormat,
}

impl RouteOutcome {
    /// Check if the sender was sent a warning
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            RouteOutcome::RecipientNotFound { .. }
                | RouteOutcome::SelfMessage
                | RouteOutcome::InvalidFormat
        )
    }
}

/// Applies the routing policy against a shared [`Registry`]
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<Registry>,
}

impl MessageRouter {
    /// Create a router over the given registry
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Get the registry this router reads from
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Route `line` sent by `sender`
    ///
    /// Replies to the sender go through `reply`. A reply or delivery that
    /// cannot be queued because the target session is closing is dropped.
    pub fn route(&self, sender: &str, reply: &SessionSink, line: &str) -> RouteOutcome {
        trace!(sender = %sender, line = %line, "Routing line");

        match Command::parse(line) {
            Command::Direct { recipient, body } => self.route_direct(sender, reply, recipient, body),
            Command::OnlineUsers => {
                let names = self.registry.list_other_usernames(sender);
                let count = names.len();
                Self::reply(reply, protocol::format_user_list(&names));
                RouteOutcome::OnlineUsers { count }
            }
            Command::Invalid => {
                Self::reply(reply, protocol::INVALID_FORMAT_WARNING);
                RouteOutcome::InvalidFormat
            }
        }
    }

    fn route_direct(
        &self,
        sender: &str,
        reply: &SessionSink,
        recipient: &str,
        body: &str,
    ) -> RouteOutcome {
        let Some(target) = self.registry.lookup(recipient) else {
            Self::reply(reply, protocol::user_not_found_warning(recipient));
            return RouteOutcome::RecipientNotFound {
                recipient: recipient.to_string(),
            };
        };

        if recipient == sender {
            Self::reply(reply, protocol::SELF_MESSAGE_WARNING);
            return RouteOutcome::SelfMessage;
        }

        match target.deliver(protocol::format_direct_message(sender, body)) {
            Ok(()) => RouteOutcome::Delivered {
                recipient: recipient.to_string(),
            },
            Err(_) => {
                debug!(
                    sender = %sender,
                    recipient = %recipient,
                    "Recipient session closed before delivery"
                );
                RouteOutcome::RecipientGone {
                    recipient: recipient.to_string(),
                }
            }
        }
    }

    fn reply(sink: &SessionSink, line: impl Into<String>) {
        if sink.deliver(line).is_err() {
            debug!(connection_id = %sink.connection_id(), "Dropping reply to closing session");
        }
    }
}
