// Need-to-responder matching service.
//
// This crate continuously assigns reported needs to available responders:
// geographically efficient, capability-correct, priority-fair, and safe
// against double-booking under concurrent updates.
//
// The persistence/API layer and dashboards are external collaborators: they
// feed need/responder records in through `kernel::MatcherService` and consume
// sequence-numbered assignment events back out.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
