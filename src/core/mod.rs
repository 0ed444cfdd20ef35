//! 核心编排层：状态、错误、执行循环、恢复管理、编排器

pub mod builder;
pub mod error;
pub mod events;
pub mod loop_;
pub mod orchestrator;
pub mod recovery;
pub mod state;

pub use builder::OrchestratorBuilder;
pub use error::{HiveError, MemoryError, PlanError};
pub use events::LoopEvent;
pub use loop_::ExecutionLoop;
pub use orchestrator::{Orchestrator, SessionOutcome, SessionReport};
pub use recovery::{RecoveryManager, RecoveryOutcome, SUGGESTION_FILE};
pub use state::{
    ActionStatus, EscalationRecord, LoopState, Plan, SessionState, StateDelta, PLAN_KEYS,
    STEP_KEYS,
};
