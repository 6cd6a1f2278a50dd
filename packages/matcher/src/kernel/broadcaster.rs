//! Real-time fan-out of assignment lifecycle events with replay support.
//!
//! Built on a `tokio::sync::broadcast` channel: publication never blocks on
//! subscribers, a stalled consumer lags and is told so, and disconnects are
//! isolated per receiver. On top of that sits a bounded drop-oldest replay
//! ring, so a reconnecting subscriber can hand in its last-seen sequence
//! number and receive what it missed.
//!
//! Delivery is at-least-once: a subscriber connecting mid-publish can see an
//! event both in the replay backlog and live. Consumers drop duplicates by
//! sequence number.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};

use crate::domains::dispatch::events::AssignmentEvent;

/// Default live-channel capacity per subscriber before lagging.
const CHANNEL_CAPACITY: usize = 256;

pub struct DispatchBroadcaster {
    sequence: AtomicU64,
    tx: broadcast::Sender<AssignmentEvent>,
    replay: RwLock<VecDeque<AssignmentEvent>>,
    replay_capacity: usize,
}

impl DispatchBroadcaster {
    pub fn new(replay_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sequence: AtomicU64::new(0),
            tx,
            replay: RwLock::new(VecDeque::with_capacity(replay_capacity)),
            replay_capacity,
        }
    }

    /// Stamp the next sequence number on `event`, record it for replay and
    /// fan it out. Publishing with no subscribers is a no-op, not an error.
    pub async fn publish(&self, mut event: AssignmentEvent) -> AssignmentEvent {
        event.sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut replay = self.replay.write().await;
            if replay.len() == self.replay_capacity {
                replay.pop_front();
            }
            replay.push_back(event.clone());
        }

        // Ignore send errors (no active receivers)
        let _ = self.tx.send(event.clone());
        event
    }

    /// Subscribe, optionally replaying everything after `last_event_id`.
    ///
    /// Returns the missed backlog plus a live receiver. The receiver is
    /// created before the backlog snapshot, so no event can fall in the gap;
    /// the overlap this allows is covered by sequence-number dedup.
    pub async fn subscribe(
        &self,
        last_event_id: Option<u64>,
    ) -> (Vec<AssignmentEvent>, broadcast::Receiver<AssignmentEvent>) {
        let rx = self.tx.subscribe();
        let backlog = match last_event_id {
            Some(last) => {
                let replay = self.replay.read().await;
                replay
                    .iter()
                    .filter(|event| event.sequence > last)
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };
        (backlog, rx)
    }

    /// Sequence number of the most recently published event (0 if none yet).
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}
