//! Periodic keep-alive frames for one connection.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::messages::ProtocolMessage;
use super::outbound::Outbound;

/// Shortest period accepted; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A running keep-alive timer.
///
/// Emits `ka` immediately and then once per interval through the
/// connection's [`Outbound`] queue. Stops when [`KeepAlive::stop`] is
/// called, when dropped, or when the connection stops writing.
#[derive(Debug)]
pub struct KeepAlive {
    task: JoinHandle<()>,
}

impl KeepAlive {
    /// Arms a timer ticking every `interval`.
    #[must_use]
    pub fn spawn(interval: Duration, outbound: Outbound) -> Self {
        let period = interval.max(MIN_INTERVAL);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !outbound.send(ProtocolMessage::KeepAlive).await {
                    break;
                }
            }
            tracing::trace!("keep-alive timer finished");
        });
        Self { task }
    }

    /// Stops the timer. No frame is queued after this returns.
    pub fn stop(self) {
        self.task.abort();
    }

    /// Returns `true` once the timer task has ended.
    #[cfg(test)]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.task.abort();
    }
}
