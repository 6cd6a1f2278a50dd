use thiserror::Error;

use super::entity_ids::{NeedId, ResponderId};

/// Errors surfaced at the matching service boundary.
///
/// Note what is *not* here: "no eligible responder" is a normal, persistent
/// state (the need stays pending), never an error.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("invalid coordinates: lat {lat}, lon {lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("unknown capability tag: {0:?}")]
    UnknownCapability(String),

    #[error("headcount must be a positive integer")]
    InvalidHeadcount,

    #[error("responder capacity must be at least 1")]
    InvalidCapacity,

    #[error("unknown need: {0}")]
    UnknownNeed(NeedId),

    #[error("unknown responder: {0}")]
    UnknownResponder(ResponderId),

    #[error("responder already registered: {0}")]
    DuplicateResponder(ResponderId),

    #[error("need {0} has no assignment awaiting confirmation")]
    NoActiveAssignment(NeedId),
}
