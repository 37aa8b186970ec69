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

//! Username directory shared by every session
//!
//! The registry maps a username to the [`SessionSink`] of the session that
//! registered it. It is the only state shared between session workers and is
//! safe to use from any number of tasks at once.

use crate::{ConnectionId, SessionSink};
use dashmap::DashMap;
use tracing::debug;

/// Concurrent username → sink directory
#[derive(Debug, Default)]
pub struct Registry {
    /// Registered users (lock-free concurrent map)
    entries: DashMap<String, SessionSink>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `username`, replacing any earlier registration of the same name
    pub fn register(&self, username: impl Into<String>, sink: SessionSink) {
        let username = username.into();
        let id = sink.connection_id();
        if let Some(previous) = self.entries.insert(username.clone(), sink) {
            debug!(
                username = %username,
                previous = %previous.connection_id(),
                current = %id,
                "Registration superseded"
            );
        }
    }

    /// Remove `username` regardless of which session owns it
    ///
    /// Returns `true` if an entry was removed.
    pub fn unregister(&self, username: &str) -> bool {
        self.entries.remove(username).is_some()
    }

    /// Remove `username` only while it still belongs to session `id`
    ///
    /// Returns `true` if an entry was removed.
    pub fn unregister_session(&self, username: &str, id: ConnectionId) -> bool {
        self.entries
            .remove_if(username, |_, sink| sink.connection_id() == id)
            .is_some()
    }

    /// Look up the sink registered under `username`
    pub fn lookup(&self, username: &str) -> Option<SessionSink> {
        self.entries.get(username).map(|entry| entry.value().clone())
    }

    /// Snapshot of every registered username except `excluding`
    ///
    /// Order is unspecified. A name registered for the whole duration of the
    /// call appears exactly once.
    pub fn list_other_usernames(&self, excluding: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.key() != excluding)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Check if `username` is registered
    pub fn contains(&self, username: &str) -> bool {
        self.entries.contains_key(username)
    }

    /// Number of registered usernames
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nobody is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(id: u64) -> SessionSink {
        SessionSink::channel(ConnectionId::new(id)).0
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        registry.register("alice", sink(1));

        assert!(registry.contains("alice"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup("alice").map(|s| s.connection_id()),
            Some(ConnectionId::new(1))
        );
        assert!(registry.lookup("bob").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = Registry::new();
        registry.register("alice", sink(1));
        registry.register("alice", sink(2));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup("alice").map(|s| s.connection_id()),
            Some(ConnectionId::new(2))
        );
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = Registry::new();
        registry.register("alice", sink(1));

        assert!(registry.unregister("alice"));
        assert!(!registry.unregister("alice"));
        assert!(!registry.unregister("nobody"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_session_checks_owner() {
        let registry = Registry::new();
        registry.register("alice", sink(1));
        registry.register("alice", sink(2));

        assert!(!registry.unregister_session("alice", ConnectionId::new(1)));
        assert!(registry.contains("alice"));

        assert!(registry.unregister_session("alice", ConnectionId::new(2)));
        assert!(!registry.contains("alice"));
    }

    #[test]
    fn test_list_other_usernames() {
        let registry = Registry::new();
        for (id, name) in ["u1", "u2", "u3"].iter().enumerate() {
            registry.register(*name, sink(id as u64));
        }

        let mut others = registry.list_other_usernames("u1");
        others.sort();
        assert_eq!(others, vec!["u2".to_string(), "u3".to_string()]);

        registry.unregister("u2");
        registry.unregister("u3");
        assert!(registry.list_other_usernames("u1").is_empty());
    }
}
