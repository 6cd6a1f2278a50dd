//! Responder registry: the authoritative store for responder state and the
//! per-responder serialization point for capacity reservation.
//!
//! `load` is only ever mutated while holding the responder's `DashMap` entry
//! lock, so two concurrent assigner runs can never both take the last unit of
//! capacity — the central correctness invariant of the subsystem. There is no
//! global lock; reservations against different responders proceed in
//! parallel.

use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

use crate::common::{DispatchError, GeoPoint, ResponderId};
use crate::domains::dispatch::models::{Availability, Responder};

/// External status delta for a responder (location ping, capacity change,
/// availability flip). All fields optional; absent fields are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponderDelta {
    pub location: Option<GeoPoint>,
    pub capacity: Option<u32>,
    pub availability: Option<Availability>,
}

/// What a delta changed, so the caller can update the geo index and decide
/// whether to trigger a rematch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaOutcome {
    pub moved_to: Option<GeoPoint>,
    /// The delta opened up capacity the responder did not have before
    /// (became available, or capacity rose above load).
    pub frees_capacity: bool,
}

#[derive(Default)]
pub struct ResponderRegistry {
    responders: DashMap<ResponderId, Responder>,
}

impl ResponderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new responder.
    ///
    /// # Errors
    ///
    /// `DuplicateResponder` if the id is already registered.
    pub fn insert(&self, responder: Responder) -> Result<(), DispatchError> {
        let id = responder.id;
        match self.responders.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(DispatchError::DuplicateResponder(id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(responder);
                Ok(())
            }
        }
    }

    /// Snapshot of a responder's current state.
    pub fn get(&self, id: &ResponderId) -> Option<Responder> {
        self.responders.get(id).map(|r| r.clone())
    }

    /// Atomically reserve one unit of capacity.
    ///
    /// Returns `false` when the responder is unknown, unavailable, or full —
    /// the losing side of a reservation race simply sees `false` and moves on
    /// to its next-ranked candidate.
    pub fn try_reserve(&self, id: &ResponderId) -> bool {
        match self.responders.get_mut(id) {
            Some(mut responder) => {
                if responder.is_eligible() {
                    responder.load += 1;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// Return one unit of capacity (assignment expired/completed/cancelled).
    pub fn release(&self, id: &ResponderId) {
        if let Some(mut responder) = self.responders.get_mut(id) {
            if responder.load == 0 {
                debug!(responder_id = %id, "Release called on idle responder; ignoring");
            } else {
                responder.load -= 1;
            }
        }
    }

    /// Apply an external status delta under the entry lock.
    ///
    /// Capacity may drop below the current load; that is legal — the
    /// responder just accepts no new work until assignments drain.
    pub fn apply_delta(
        &self,
        id: &ResponderId,
        delta: ResponderDelta,
    ) -> Result<DeltaOutcome, DispatchError> {
        let mut responder = self
            .responders
            .get_mut(id)
            .ok_or(DispatchError::UnknownResponder(*id))?;

        let was_eligible = responder.is_eligible();
        let mut outcome = DeltaOutcome::default();

        if let Some(location) = delta.location {
            responder.location = location;
            outcome.moved_to = Some(location);
        }
        if let Some(capacity) = delta.capacity {
            if capacity == 0 {
                return Err(DispatchError::InvalidCapacity);
            }
            responder.capacity = capacity;
        }
        if let Some(availability) = delta.availability {
            responder.availability = availability;
        }

        outcome.frees_capacity = !was_eligible && responder.is_eligible();
        Ok(outcome)
    }

    /// Number of registered responders.
    pub fn len(&self) -> usize {
        self.responders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responders.is_empty()
    }
}
