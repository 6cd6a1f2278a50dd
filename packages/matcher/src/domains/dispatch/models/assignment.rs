use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{AssignmentId, NeedId, ResponderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Proposed,
    Confirmed,
    Expired,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Completed | Self::Cancelled)
    }
}

/// A binding between one need and one responder.
///
/// At most one non-terminal assignment exists per need at any time. The `id`
/// guards against stale expiry timers firing for a superseded assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub need_id: NeedId,
    pub responder_id: ResponderId,
    pub distance_km: f64,
    pub match_score: f64,
    pub assigned_at: DateTime<Utc>,
    pub status: AssignmentStatus,
}

impl Assignment {
    pub fn propose(
        need_id: NeedId,
        responder_id: ResponderId,
        distance_km: f64,
        match_score: f64,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            need_id,
            responder_id,
            distance_km,
            match_score,
            assigned_at: Utc::now(),
            status: AssignmentStatus::Proposed,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
