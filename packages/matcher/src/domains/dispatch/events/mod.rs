use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{NeedId, ResponderId};
use crate::domains::dispatch::models::{Assignment, AssignmentStatus};

/// Assignment lifecycle stage carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentEventKind {
    Proposed,
    Confirmed,
    Expired,
    Completed,
    Cancelled,
}

impl AssignmentEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Confirmed => "confirmed",
            Self::Expired => "expired",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<AssignmentStatus> for AssignmentEventKind {
    fn from(status: AssignmentStatus) -> Self {
        match status {
            AssignmentStatus::Proposed => Self::Proposed,
            AssignmentStatus::Confirmed => Self::Confirmed,
            AssignmentStatus::Expired => Self::Expired,
            AssignmentStatus::Completed => Self::Completed,
            AssignmentStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// A sequence-numbered assignment lifecycle event.
///
/// Delivery is at-least-once; `sequence` increases monotonically so a
/// reconnecting subscriber can replay from its last-seen number and drop
/// duplicates idempotently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentEvent {
    pub sequence: u64,
    #[serde(rename = "type")]
    pub kind: AssignmentEventKind,
    pub need_id: NeedId,
    pub responder_id: ResponderId,
    pub distance_km: f64,
    pub timestamp: DateTime<Utc>,
}

impl AssignmentEvent {
    /// Build the (unsequenced) payload for an assignment transition; the
    /// broadcaster stamps `sequence` at publish time.
    pub fn for_assignment(assignment: &Assignment, kind: AssignmentEventKind) -> Self {
        Self {
            sequence: 0,
            kind,
            need_id: assignment.need_id,
            responder_id: assignment.responder_id,
            distance_km: assignment.distance_km,
            timestamp: Utc::now(),
        }
    }
}
