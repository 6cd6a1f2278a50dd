use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::common::{Capability, GeoPoint, NeedId, ResponderId};

/// How badly a need must be served. Ordering is derived, so
/// `Critical > High > Medium > Low` holds for queue ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedStatus {
    Pending,
    Matched,
    Fulfilled,
    Cancelled,
}

impl NeedStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Cancelled)
    }
}

/// A reported requirement for aid at a location.
///
/// Invariant: `assigned_responder_id` is `Some` exactly when
/// `status == Matched`. Only the assigner flips those two fields together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Need {
    pub id: NeedId,
    pub location: GeoPoint,
    pub urgency: Urgency,
    pub required_capabilities: BTreeSet<Capability>,
    pub headcount: Option<u32>,
    pub status: NeedStatus,
    pub created_at: DateTime<Utc>,
    pub assigned_responder_id: Option<ResponderId>,
}

impl Need {
    pub fn new(
        location: GeoPoint,
        urgency: Urgency,
        required_capabilities: BTreeSet<Capability>,
        headcount: Option<u32>,
    ) -> Self {
        Self {
            id: NeedId::new(),
            location,
            urgency,
            required_capabilities,
            headcount,
            status: NeedStatus::Pending,
            created_at: Utc::now(),
            assigned_responder_id: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == NeedStatus::Pending
    }
}
