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

//! Lock-free metrics for the relay server

use crate::RouteOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free server metrics
///
/// All metrics are stored as atomics and can be accessed concurrently
/// without locks. Use the `snapshot()` method to get a view of all metrics
/// at a point in time.
#[derive(Debug)]
pub struct ServerMetrics {
    // Connection counts
    total_connections: AtomicU64,
    active_connections: AtomicU64,

    // Traffic
    lines_received: AtomicU64,
    messages_delivered: AtomicU64,
    messages_dropped: AtomicU64,
    queries_answered: AtomicU64,
    warnings_sent: AtomicU64,

    // Errors
    connection_errors: AtomicU64,
    timeout_errors: AtomicU64,

    // Timing (stored as nanoseconds)
    total_connection_duration_ns: AtomicU64,

    // Server start time
    started_at: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            lines_received: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            queries_answered: AtomicU64::new(0),
            warnings_sent: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            timeout_errors: AtomicU64::new(0),
            total_connection_duration_ns: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    // Connection tracking

    /// Record a new connection being opened
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection being closed
    pub fn connection_closed(&self, duration: Duration) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        self.total_connection_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Get the current number of active connections
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Get the total number of connections since server start
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    // Traffic

    /// Record a line read from a registered session
    pub fn line_received(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record what the router did with a line
    pub fn line_routed(&self, outcome: &RouteOutcome) {
        let counter = match outcome {
            RouteOutcome::Delivered { .. } => &self.messages_delivered,
            RouteOutcome::RecipientGone { .. } => &self.messages_dropped,
            RouteOutcome::OnlineUsers { .. } => &self.queries_answered,
            RouteOutcome::RecipientNotFound { .. }
            | RouteOutcome::SelfMessage
            | RouteOutcome::InvalidFormat => &self.warnings_sent,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking

    /// Record a session that ended with an error
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session that timed out
    pub fn timeout_error(&self) {
        self.timeout_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Snapshot

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_connections.load(Ordering::Relaxed);
        let active = self.active_connections.load(Ordering::Relaxed);
        let closed = total.saturating_sub(active);
        let total_duration_ns = self.total_connection_duration_ns.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_connections: total,
            active_connections: active,
            lines_received: self.lines_received.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            warnings_sent: self.warnings_sent.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            timeout_errors: self.timeout_errors.load(Ordering::Relaxed),
            average_connection_duration: if closed > 0 {
                Duration::from_nanos(total_duration_ns / closed)
            } else {
                Duration::ZERO
            },
            uptime: self.started_at.elapsed(),
        }
    }
}

/// Point-in-time copy of [`ServerMetrics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Connections accepted since start
    pub total_connections: u64,
    /// Connections currently open
    pub active_connections: u64,
    /// Lines read from registered sessions
    pub lines_received: u64,
    /// Direct messages queued for a recipient
    pub messages_delivered: u64,
    /// Direct messages whose recipient vanished mid-send
    pub messages_dropped: u64,
    /// Online-users queries answered
    pub queries_answered: u64,
    /// Warnings sent back to senders
    pub warnings_sent: u64,
    /// Sessions that ended with an error
    pub connection_errors: u64,
    /// Sessions that timed out
    pub timeout_errors: u64,
    /// Mean lifetime of closed connections
    pub average_connection_duration: Duration,
    /// Time since the metrics were created
    pub uptime: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_tracking() {
        let metrics = ServerMetrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed(Duration::from_secs(4));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.average_connection_duration, Duration::from_secs(4));
    }

    #[test]
    fn test_route_outcomes() {
        let metrics = ServerMetrics::new();
        metrics.line_routed(&RouteOutcome::Delivered {
            recipient: "a".into(),
        });
        metrics.line_routed(&RouteOutcome::SelfMessage);
        metrics.line_routed(&RouteOutcome::InvalidFormat);
        metrics.line_routed(&RouteOutcome::OnlineUsers { count: 3 });
        metrics.line_routed(&RouteOutcome::RecipientGone {
            recipient: "b".into(),
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_delivered, 1);
        assert_eq!(snapshot.warnings_sent, 2);
        assert_eq!(snapshot.queries_answered, 1);
        assert_eq!(snapshot.messages_dropped, 1);
    }
}
