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

//! Wire grammar of the relay
//!
//! Every message is a single newline-terminated line of text. The first line a
//! client sends is its username; every later line is parsed into a [`Command`].
//!
//! | client sends              | meaning                    |
//! |---------------------------|----------------------------|
//! | `@<recipient>:<message>`  | direct message             |
//! | `... online users ...`    | list the other online users |
//! | anything else             | rejected with a warning    |

/// Substring that turns any line into an online-users query
pub const ONLINE_USERS_TRIGGER: &str = "online users";

/// Separator placed between names in the online-users reply
pub const USER_LIST_SEPARATOR: &str = ", ";

/// Reply to a line that is neither a direct message nor a query
pub const INVALID_FORMAT_WARNING: &str = "[Warning]: Invalid message format. Please correct the format[eg: @recipientUsername: <Your Message>] and resend for delivery.";

/// Reply to a direct message addressed to its own sender
pub const SELF_MESSAGE_WARNING: &str = "[Warning]: You can't send messages to yourself.";

/// Reply to a direct message whose recipient is not registered
pub fn user_not_found_warning(recipient: &str) -> String {
    format!("[Warning]: User {} not found or offline.", recipient)
}

/// Line delivered to the recipient of a direct message
pub fn format_direct_message(sender: &str, body: &str) -> String {
    format!("{}:{}", sender, body)
}

/// Reply listing the other online users
pub fn format_user_list<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join(USER_LIST_SEPARATOR)
}

/// A parsed client line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `@recipient:body`, split at the first colon of the whole line
    Direct {
        /// Text between the leading `@` and the first `:`
        recipient: &'a str,
        /// Everything after the first `:`, untouched
        body: &'a str,
    },
    /// A line mentioning `online users`
    OnlineUsers,
    /// Anything else
    Invalid,
}

impl<'a> Command<'a> {
    /// Parse one line (without its line terminator)
    ///
    /// Direct messages take precedence over the online-users query, so
    /// `@bob:who is online users` is delivered to `bob`.
    ///
    /// # Example
    ///
    /// ```
    /// use parley_service::Command;
    ///
    /// assert_eq!(
    ///     Command::parse("@alice: hi there"),
    ///     Command::Direct { recipient: "alice", body: " hi there" }
    /// );
    /// assert_eq!(Command::parse("show online users"), Command::OnlineUsers);
    /// assert_eq!(Command::parse("hello"), Command::Invalid);
    /// ```
    pub fn parse(line: &'a str) -> Self {
        if line.starts_with('@') {
            if let Some(colon) = line.find(':') {
                return Command::Direct {
                    recipient: &line[1..colon],
                    body: &line[colon + 1..],
                };
            }
        }

        if line.contains(ONLINE_USERS_TRIGGER) {
            return Command::OnlineUsers;
        }

        Command::Invalid
    }
}
