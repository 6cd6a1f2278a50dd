pub mod assignment;
pub mod need;
pub mod responder;

pub use assignment::{Assignment, AssignmentStatus};
pub use need::{Need, NeedStatus, Urgency};
pub use responder::{Availability, Responder};
