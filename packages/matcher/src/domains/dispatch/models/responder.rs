use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::common::{Capability, GeoPoint, ResponderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable,
}

/// An aid worker or asset capable of serving needs.
///
/// Invariant: `load <= capacity`. `load` is only mutated through the
/// registry's per-entry locked reserve/release, never directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Responder {
    pub id: ResponderId,
    pub location: GeoPoint,
    pub capabilities: BTreeSet<Capability>,
    /// Number of concurrent needs this responder can serve (>= 1).
    pub capacity: u32,
    /// Current number of active assignments.
    pub load: u32,
    pub availability: Availability,
}

impl Responder {
    pub fn new(
        location: GeoPoint,
        capabilities: BTreeSet<Capability>,
        capacity: u32,
        availability: Availability,
    ) -> Self {
        Self {
            id: ResponderId::new(),
            location,
            capabilities,
            capacity,
            load: 0,
            availability,
        }
    }

    /// Eligible for new work: available with spare capacity.
    pub fn is_eligible(&self) -> bool {
        self.availability == Availability::Available && self.load < self.capacity
    }

    /// Fraction of capacity currently in use, in [0, 1].
    pub fn load_fraction(&self) -> f64 {
        if self.capacity == 0 {
            1.0
        } else {
            f64::from(self.load) / f64::from(self.capacity)
        }
    }
}
