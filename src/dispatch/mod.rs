//! 分派层：能力路由表、Worker 输出归一化、Dispatcher

pub mod dispatcher;
pub mod outcome;
pub mod router;

pub use dispatcher::Dispatcher;
pub use outcome::{normalize, PriorOutcome, StepOutcome, WorkerOutput};
pub use router::{is_read_like, route, CapabilityTag, DEFAULT_CAPABILITY, ROUTING_TABLE};
