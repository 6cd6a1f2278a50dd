//! Typed ID definitions for the matching domain entities.
//!
//! Each alias is a distinct type, so the compiler rejects a `NeedId` where a
//! `ResponderId` is expected.

pub use super::id::{Id, V4, V7};

/// Marker type for Need entities (reported requirements for aid).
pub struct Need;

/// Marker type for Responder entities (aid workers and assets).
pub struct Responder;

/// Marker type for Assignment entities (need ↔ responder bindings).
pub struct Assignment;

/// Typed ID for Need entities.
pub type NeedId = Id<Need>;

/// Typed ID for Responder entities.
pub type ResponderId = Id<Responder>;

/// Typed ID for Assignment entities.
pub type AssignmentId = Id<Assignment>;
