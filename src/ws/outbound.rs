//! Producer side of a connection's single write path.
//!
//! Operation runners and the keep-alive timer never touch the socket.
//! They push frames into a bounded queue that only the connection's run
//! loop drains, so frames are written one at a time and in the order each
//! producer queued them.

use tokio::sync::mpsc;

use super::messages::ProtocolMessage;

/// Cloneable handle for queuing frames towards one connection's socket.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<ProtocolMessage>,
}

impl Outbound {
    /// Creates a queue holding at most `capacity` frames (minimum 1).
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProtocolMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queues `message`, waiting for room if the queue is full.
    ///
    /// Returns `false` once the connection has stopped writing; the
    /// message is dropped silently in that case.
    pub async fn send(&self, message: ProtocolMessage) -> bool {
        self.tx.send(message).await.is_ok()
    }

    /// Returns `true` once the connection has stopped writing.
    #[cfg(test)]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_arrive_in_queue_order() {
        let (outbound, mut rx) = Outbound::channel(4);
        assert!(outbound.send(ProtocolMessage::KeepAlive).await);
        assert!(outbound.send(ProtocolMessage::complete("a")).await);

        assert_eq!(rx.recv().await, Some(ProtocolMessage::KeepAlive));
        assert_eq!(rx.recv().await, Some(ProtocolMessage::complete("a")));
    }

    #[tokio::test]
    async fn sends_after_close_are_dropped() {
        let (outbound, rx) = Outbound::channel(1);
        drop(rx);
        assert!(outbound.is_closed());
        assert!(!outbound.send(ProtocolMessage::KeepAlive).await);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (outbound, _rx) = Outbound::channel(0);
        assert!(!outbound.is_closed());
    }
}
