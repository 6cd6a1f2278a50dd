//! Priority queue of pending needs awaiting a match attempt.
//!
//! Ordering: urgency descending, then `created_at` ascending (strict FIFO
//! within equal urgency, so old needs never starve), then need id for
//! determinism. Removal is lazy: a live-id set marks entries dead and `pop`
//! skips stale heap entries.

use chrono::{DateTime, Utc};
use std::collections::{BinaryHeap, HashSet};
use std::sync::Mutex;

use crate::common::NeedId;
use crate::domains::dispatch::models::{Need, Urgency};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    urgency: Urgency,
    created_at: DateTime<Utc>,
    id: NeedId,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher urgency first, then earlier created_at, then
        // smaller id so equal submissions order deterministically.
        self.urgency
            .cmp(&other.urgency)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<Entry>,
    live: HashSet<NeedId>,
}

/// Internally synchronized queue; writers exclude each other, critical
/// sections are short and never held across await points.
#[derive(Default)]
pub struct NeedQueue {
    inner: Mutex<Inner>,
}

impl NeedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a pending need. Re-pushing an already-queued id is a no-op.
    pub fn push(&self, need: &Need) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.live.insert(need.id) {
            inner.heap.push(Entry {
                urgency: need.urgency,
                created_at: need.created_at,
                id: need.id,
            });
        }
    }

    /// Re-insert a need after an expired or failed match. The need keeps its
    /// original `created_at`, so it does not lose queue seniority.
    pub fn requeue(&self, need: &Need) {
        self.push(need);
    }

    /// Highest-priority pending need id, or `None` when empty.
    pub fn pop(&self) -> Option<NeedId> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(entry) = inner.heap.pop() {
            if inner.live.remove(&entry.id) {
                return Some(entry.id);
            }
            // Stale entry from a lazy removal; skip it.
        }
        None
    }

    /// Drop a need from the queue (cancellation, or matched directly).
    /// Safe to call when absent.
    pub fn remove(&self, id: &NeedId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.live.remove(id);
    }

    /// Number of live queued needs.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .live
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::GeoPoint;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn need(urgency: Urgency, age_secs: i64) -> Need {
        let mut n = Need::new(
            GeoPoint::new(44.98, -93.27).unwrap(),
            urgency,
            BTreeSet::new(),
            None,
        );
        n.created_at = Utc::now() - Duration::seconds(age_secs);
        n
    }

    #[test]
    fn test_urgency_beats_age() {
        let queue = NeedQueue::new();
        let old_low = need(Urgency::Low, 3600);
        let new_critical = need(Urgency::Critical, 0);

        queue.push(&old_low);
        queue.push(&new_critical);

        assert_eq!(queue.pop(), Some(new_critical.id));
        assert_eq!(queue.pop(), Some(old_low.id));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_fifo_within_equal_urgency() {
        let queue = NeedQueue::new();
        let older = need(Urgency::High, 120);
        let newer = need(Urgency::High, 10);

        queue.push(&newer);
        queue.push(&older);

        assert_eq!(queue.pop(), Some(older.id));
        assert_eq!(queue.pop(), Some(newer.id));
    }

    #[test]
    fn test_remove_then_pop_skips() {
        let queue = NeedQueue::new();
        let a = need(Urgency::High, 60);
        let b = need(Urgency::Medium, 60);

        queue.push(&a);
        queue.push(&b);
        queue.remove(&a.id);

        assert_eq!(queue.pop(), Some(b.id));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_requeue_preserves_seniority() {
        let queue = NeedQueue::new();
        let senior = need(Urgency::Medium, 600);
        let junior = need(Urgency::Medium, 60);

        queue.push(&senior);
        queue.push(&junior);

        // Senior pops first, fails to match, and is requeued — it must still
        // beat the junior need next time around.
        assert_eq!(queue.pop(), Some(senior.id));
        queue.requeue(&senior);
        assert_eq!(queue.pop(), Some(senior.id));
        assert_eq!(queue.pop(), Some(junior.id));
    }

    #[test]
    fn test_push_is_idempotent() {
        let queue = NeedQueue::new();
        let n = need(Urgency::High, 0);
        queue.push(&n);
        queue.push(&n);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(n.id));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_remove_absent_is_safe() {
        let queue = NeedQueue::new();
        queue.remove(&NeedId::new());
        assert!(queue.is_empty());
    }
}
