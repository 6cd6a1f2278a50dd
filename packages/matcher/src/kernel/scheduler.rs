//! Event-driven rematch scheduling.
//!
//! The matcher never polls: every state change that could produce a new
//! assignment lands here as a discrete trigger, and each trigger causes a
//! bounded unit of work — one match attempt, or a bounded batch from the
//! queue head — never a full-dataset recomputation.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::common::{AssignmentId, NeedId, ResponderId};
use crate::kernel::assigner::Assigner;

/// A delta that wakes the assigner.
#[derive(Debug, Clone, Copy)]
pub enum MatchTrigger {
    /// A new need was submitted; attempt to match it immediately.
    NeedSubmitted(NeedId),
    /// A responder registered or became eligible again.
    ResponderAvailable(ResponderId),
    /// An assignment finished or was cancelled, returning capacity.
    CapacityFreed(ResponderId),
    /// A proposed assignment sat unconfirmed past the timeout.
    AssignmentExpired {
        need_id: NeedId,
        assignment_id: AssignmentId,
    },
}

/// Consume triggers until the channel closes (service dropped).
///
/// Triggers are processed one at a time; the capacity-reservation step is
/// atomic per responder, so handlers could be spawned concurrently without
/// violating the capacity invariant if throughput ever demands it.
pub async fn run(assigner: Arc<Assigner>, mut rx: mpsc::UnboundedReceiver<MatchTrigger>) {
    while let Some(trigger) = rx.recv().await {
        debug!(trigger = ?trigger, "Processing match trigger");
        match trigger {
            MatchTrigger::NeedSubmitted(need_id) => {
                assigner.try_match_need(need_id).await;
            }
            MatchTrigger::ResponderAvailable(_) | MatchTrigger::CapacityFreed(_) => {
                assigner.drain_pending_batch().await;
            }
            MatchTrigger::AssignmentExpired {
                need_id,
                assignment_id,
            } => {
                assigner.expire_assignment(need_id, assignment_id).await;
            }
        }
    }
    debug!("Trigger channel closed; rematch scheduler stopping");
}
