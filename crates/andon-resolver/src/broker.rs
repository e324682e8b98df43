//! Live-delta fan-out over a bounded broadcast channel.
//!
//! Deltas exist only in flight. A subscriber that falls more than
//! [`DELTA_CAPACITY`] deltas behind observes
//! [`Lagged`](tokio::sync::broadcast::error::RecvError::Lagged) on its
//! receiver; consumers surface that as a [`Delta::Gap`] and refetch
//! authoritative state before trusting the stream again.

use andon_core::delta::Delta;
use tokio::sync::broadcast;
use tracing::debug;

/// Channel capacity. Bounds how far a slow subscriber may fall behind
/// before it is lagged out.
pub const DELTA_CAPACITY: usize = 256;

/// Fan-out hub for [`Delta`]s. Cloning shares the underlying channel, so
/// every handle publishes to the same subscribers.
#[derive(Clone)]
pub struct Broker {
  sender: broadcast::Sender<Delta>,
}

impl Broker {
  pub fn new() -> Self {
    let (sender, _) = broadcast::channel(DELTA_CAPACITY);
    Self { sender }
  }

  /// Subscribe to deltas published after this call. There is no replay.
  pub fn subscribe(&self) -> broadcast::Receiver<Delta> {
    self.sender.subscribe()
  }

  /// Publish to all current subscribers. Best-effort: with no subscribers
  /// the delta is dropped.
  pub fn publish(&self, delta: Delta) {
    match self.sender.send(delta) {
      Ok(subscribers) => debug!(subscribers, "delta published"),
      Err(_) => debug!("delta dropped, no subscribers"),
    }
  }
}

impl Default for Broker {
  fn default() -> Self { Self::new() }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
