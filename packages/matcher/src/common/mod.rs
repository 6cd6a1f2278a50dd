// Common types shared across the kernel and domain layers.

pub mod capability;
pub mod entity_ids;
pub mod error;
pub mod geo;
pub mod id;

pub use capability::Capability;
pub use entity_ids::{AssignmentId, NeedId, ResponderId};
pub use error::DispatchError;
pub use geo::GeoPoint;
pub use id::{Id, V4, V7};
