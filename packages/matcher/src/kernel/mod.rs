// Kernel services: the infrastructure the dispatch domain runs on.

pub mod assigner;
pub mod broadcaster;
pub mod geo_index;
pub mod need_queue;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod sse;

pub use assigner::Assigner;
pub use broadcaster::DispatchBroadcaster;
pub use geo_index::GeoIndex;
pub use need_queue::NeedQueue;
pub use registry::ResponderRegistry;
pub use scheduler::MatchTrigger;
pub use service::MatcherService;
