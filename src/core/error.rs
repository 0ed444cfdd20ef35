//! 错误类型
//!
//! 步骤失败不是错误：它以 StepOutcome（FAILURE）的形式在状态机中流转。
//! 这里只定义真正需要向上传播的故障：存储不可用、规划失败、无可恢复会话等。

use thiserror::Error;

/// 记忆服务（会话日志 / 共享知识库）错误
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("Session {session} has no access to namespace {namespace}")]
    AccessDenied { session: String, namespace: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record encoding error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Planner 错误
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Goal is empty")]
    EmptyGoal,

    #[error("Planner produced no steps")]
    EmptyPlan,

    #[error("LLM error: {0}")]
    Llm(String),
}

/// 编排器顶层错误
#[derive(Error, Debug)]
pub enum HiveError {
    #[error(transparent)]
    Store(#[from] MemoryError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("No resumable session: {0}")]
    NoResumableSession(String),

    #[error("Config error: {0}")]
    Config(String),
}
