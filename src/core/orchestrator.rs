//! 编排器：一个目标从建会话到结束的完整流程
//!
//! run：新建会话 → 执行循环 →（失败时）恢复管理器
//! resume：从 scratchpad 重建状态后直接进入恢复管理器（已升级过的会话不再重复处理，
//! 已修正过的会话不再修正）
//!
//! 运行中的致命故障（存储不可用、首次规划失败）先尽力写一条 crash_log 增量再返回错误，
//! 以便之后 --recover 时有崩溃上下文。

use std::sync::Arc;

use serde::Serialize;

use crate::core::{
    ExecutionLoop, HiveError, LoopState, MemoryError, PlanError, RecoveryManager, RecoveryOutcome,
    SessionState, StateDelta,
};
use crate::memory::{SessionId, SessionStore};

/// 会话结局
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// 首个计划直接完成
    Completed,
    /// 修正计划完成
    Recovered,
    /// 本地恢复失败，已升级求助
    Escalated,
}

impl From<RecoveryOutcome> for SessionOutcome {
    fn from(o: RecoveryOutcome) -> Self {
        match o {
            RecoveryOutcome::Recovered => SessionOutcome::Recovered,
            RecoveryOutcome::Escalated => SessionOutcome::Escalated,
        }
    }
}

/// 最终报告（CLI 以 JSON 打印到 stdout）
#[derive(Clone, Debug, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub outcome: SessionOutcome,
    pub state: SessionState,
}

pub struct Orchestrator {
    store: Arc<SessionStore>,
    exec: ExecutionLoop,
    recovery: RecoveryManager,
}

impl Orchestrator {
    pub fn new(store: Arc<SessionStore>, exec: ExecutionLoop, recovery: RecoveryManager) -> Self {
        Self {
            store,
            exec,
            recovery,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// 为新目标开一个会话并跑到结束
    pub async fn run(&self, goal: &str) -> Result<SessionReport, HiveError> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(PlanError::EmptyGoal.into());
        }

        let id = self.store.start().await?;
        let mut state = SessionState::new(goal);
        self.store
            .append(&id, &state.delta(&["goal", "phase"]))
            .await?;
        tracing::info!(session = %id, goal = %goal, "Orchestration started");

        let result = self.drive(&id, &mut state).await;
        self.finish(id, state, result).await
    }

    /// 续跑最近崩溃或中断的会话
    pub async fn resume(&self, id: SessionId) -> Result<SessionReport, HiveError> {
        let mut state = match self.store.recover(&id).await {
            Ok(s) => s,
            Err(MemoryError::SessionNotFound(_)) => {
                return Err(HiveError::NoResumableSession(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if state.escalation.is_some() {
            tracing::info!(session = %id, "Session already escalated, nothing to resume");
            return Ok(SessionReport {
                session_id: id,
                outcome: SessionOutcome::Escalated,
                state,
            });
        }

        tracing::info!(session = %id, step = state.step_index, "Resuming session via recovery");
        let result = self
            .recovery
            .recover(&id, &mut state, &self.exec)
            .await
            .map(SessionOutcome::from);
        self.finish(id, state, result).await
    }

    async fn drive(&self, id: &SessionId, state: &mut SessionState) -> Result<SessionOutcome, HiveError> {
        match self.exec.run(id, state).await? {
            LoopState::Done => Ok(SessionOutcome::Completed),
            _ => self
                .recovery
                .recover(id, state, &self.exec)
                .await
                .map(SessionOutcome::from),
        }
    }

    async fn finish(
        &self,
        id: SessionId,
        mut state: SessionState,
        result: Result<SessionOutcome, HiveError>,
    ) -> Result<SessionReport, HiveError> {
        match result {
            Ok(outcome) => {
                tracing::info!(session = %id, outcome = ?outcome, "Orchestration finished");
                Ok(SessionReport {
                    session_id: id,
                    outcome,
                    state,
                })
            }
            Err(e) => {
                tracing::error!(session = %id, "Fatal fault: {}", e);
                state.crash_log = Some(e.to_string());
                let delta = StateDelta::new().set("crash_log", state.crash_log.clone());
                if let Err(log_err) = self.store.append(&id, &delta).await {
                    tracing::warn!(session = %id, "Failed to record crash log: {}", log_err);
                }
                Err(e)
            }
        }
    }
}
