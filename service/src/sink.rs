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

//! Outbound handle to a session

use crate::{ConnectionId, ControlMessage, RelayError, Result};
use tokio::sync::mpsc;

/// Outbound handle to one session
///
/// A sink queues lines on the owning worker's control channel; the worker
/// writes them to its socket in order. Sinks are cheap to clone and may
/// outlive the session they point at, in which case every operation fails
/// with [`RelayError::ConnectionClosed`].
#[derive(Debug, Clone)]
pub struct SessionSink {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl SessionSink {
    /// Wrap the sending half of a worker's control channel
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<ControlMessage>) -> Self {
        Self { id, tx }
    }

    /// Create a sink together with the receiver it feeds
    pub fn channel(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ControlMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    /// The session this sink delivers to
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    /// Queue one line for delivery
    pub fn deliver(&self, line: impl Into<String>) -> Result<()> {
        self.tx
            .send(ControlMessage::Deliver(line.into()))
            .map_err(|_| RelayError::ConnectionClosed)
    }

    /// Ask the session to close
    pub fn close(&self) -> Result<()> {
        self.tx
            .send(ControlMessage::Close)
            .map_err(|_| RelayError::ConnectionClosed)
    }

    /// Check whether the receiving worker is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_queues_line() {
        let (sink, mut rx) = SessionSink::channel(ConnectionId::new(7));
        assert_eq!(sink.connection_id(), ConnectionId::new(7));

        sink.deliver("bob:hi").unwrap();
        sink.close().unwrap();

        assert!(matches!(rx.recv().await, Some(ControlMessage::Deliver(line)) if line == "bob:hi"));
        assert!(matches!(rx.recv().await, Some(ControlMessage::Close)));
    }

    #[test]
    fn test_deliver_to_dropped_receiver_fails_softly() {
        let (sink, rx) = SessionSink::channel(ConnectionId::new(1));
        drop(rx);

        assert!(sink.is_closed());
        assert!(matches!(
            sink.deliver("lost"),
            Err(RelayError::ConnectionClosed)
        ));
        assert!(sink.close().is_err());
    }
}
