// Dispatch domain: needs, responders, assignments and the pure logic that
// scores them. Side-effecting machinery (index, queue, assigner, broadcaster)
// lives in the kernel.

pub mod events;
pub mod models;
pub mod utils;
