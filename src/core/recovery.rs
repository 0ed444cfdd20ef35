//! 恢复管理器
//!
//! FAILED（或崩溃续跑）后：失败分析 → 修正计划 → 重跑一次执行循环。
//! 重跑成功写入一条经验；重跑再次失败（或修正计划本身出错）则向 Oracle 求助一次，
//! 建议写入工作区 escalation_suggestion.txt 与会话日志，并作为 SUCCESS 的终结结果记录。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::core::events::send_event;
use crate::core::{
    ActionStatus, EscalationRecord, ExecutionLoop, HiveError, LoopEvent, LoopState, Plan,
    SessionState, PLAN_KEYS,
};
use crate::escalation::EscalationOracle;
use crate::memory::{KnowledgeBase, Lesson, SessionId, SessionStore};
use crate::plan::Planner;

/// 升级建议落盘文件名（工作区内）
pub const SUGGESTION_FILE: &str = "escalation_suggestion.txt";

/// 恢复结论
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// 修正计划执行成功
    Recovered,
    /// 已升级求助
    Escalated,
}

pub struct RecoveryManager {
    store: Arc<SessionStore>,
    planner: Arc<Planner>,
    knowledge: Arc<KnowledgeBase>,
    oracle: Arc<dyn EscalationOracle>,
    oracle_timeout: Duration,
    workspace: PathBuf,
    events: Option<UnboundedSender<LoopEvent>>,
}

impl RecoveryManager {
    pub fn new(
        store: Arc<SessionStore>,
        planner: Arc<Planner>,
        knowledge: Arc<KnowledgeBase>,
        oracle: Arc<dyn EscalationOracle>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            planner,
            knowledge,
            oracle,
            oracle_timeout: Duration::from_secs(120),
            workspace: workspace.into(),
            events: None,
        }
    }

    pub fn with_oracle_timeout(mut self, secs: u64) -> Self {
        self.oracle_timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_events(mut self, tx: UnboundedSender<LoopEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// 失败分析 → 修正计划 → 重跑；至多一次修正、一次升级
    ///
    /// 已修正过的会话（续跑时）不再修正：修正计划已完成则直接算恢复成功，否则直接升级。
    pub async fn recover(
        &self,
        id: &SessionId,
        state: &mut SessionState,
        exec: &ExecutionLoop,
    ) -> Result<RecoveryOutcome, HiveError> {
        if state.replanned && state.phase == LoopState::Done {
            tracing::info!(session = %id, "Revised plan already completed");
            return Ok(RecoveryOutcome::Recovered);
        }

        let failure = state
            .error
            .clone()
            .or_else(|| state.crash_log.clone())
            .unwrap_or_else(|| "Unknown error".to_string());
        let last_action = state.last_action.clone().unwrap_or_default();
        tracing::info!(session = %id, error = %failure, "Entering recovery");
        send_event(
            &self.events,
            LoopEvent::RecoveryStarted {
                error: failure.clone(),
            },
        );

        if state.replanned {
            tracing::warn!(session = %id, "Session already replanned once, escalating");
            return self.escalate(id, state).await;
        }

        let analysis = match self.planner.analyze(&state.goal, &last_action, &failure).await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(session = %id, "Failure analysis unavailable: {}", e);
                failure.clone()
            }
        };
        state.analysis = Some(analysis.clone());
        self.store.append(id, &state.delta(&["analysis"])).await?;

        let failed_plan = state.plan.clone().unwrap_or_default();
        let plan = match self.planner.replan(&analysis, &state.goal).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(session = %id, "Replan failed, escalating: {}", e);
                state.error = Some(format!("Replan failed: {}", e));
                self.store.append(id, &state.delta(&["error"])).await?;
                return self.escalate(id, state).await;
            }
        };

        send_event(
            &self.events,
            LoopEvent::PlanCreated {
                steps: plan.steps().to_vec(),
                replanned: true,
            },
        );
        state.set_plan(plan);
        state.replanned = true;
        state.phase = LoopState::Running;
        self.store.append(id, &state.delta(PLAN_KEYS)).await?;

        match exec.run(id, state).await? {
            LoopState::Done => {
                self.record_lesson(id, &failure, &failed_plan, state).await;
                Ok(RecoveryOutcome::Recovered)
            }
            _ => self.escalate(id, state).await,
        }
    }

    /// 经验写入失败只告警，不影响已成功的结果
    async fn record_lesson(&self, id: &SessionId, signature: &str, failed: &Plan, state: &SessionState) {
        let succeeded = state.plan.clone().unwrap_or_default();
        let lesson = Lesson::new(signature, failed, &succeeded);
        match self.knowledge.record_lesson(id, &lesson).await {
            Ok(()) => send_event(
                &self.events,
                LoopEvent::LessonRecorded {
                    lesson_id: lesson.lesson_id,
                },
            ),
            Err(e) => tracing::warn!(session = %id, "Failed to record lesson: {}", e),
        }
    }

    /// 向 Oracle 求助一次；Oracle 报错或超时时建议文本即失败描述
    async fn escalate(&self, id: &SessionId, state: &mut SessionState) -> Result<RecoveryOutcome, HiveError> {
        let problem = format!(
            "Goal: {}\nProblem: {}\nProvide guidance or tool code to solve this.",
            state.goal,
            state
                .error
                .as_deref()
                .or(state.crash_log.as_deref())
                .unwrap_or("an unresolved problem")
        );
        tracing::info!(session = %id, "Escalating to oracle");

        let (suggestion, status) =
            match tokio::time::timeout(self.oracle_timeout, self.oracle.ask(&problem)).await {
                Ok(Ok(s)) => (s, ActionStatus::Success),
                Ok(Err(e)) => (format!("Escalation failed: {}", e), ActionStatus::Failure),
                Err(_) => (
                    format!(
                        "Escalation timed out after {}s",
                        self.oracle_timeout.as_secs()
                    ),
                    ActionStatus::Failure,
                ),
            };
        if status == ActionStatus::Failure {
            tracing::warn!(session = %id, "{}", suggestion);
        }

        if !suggestion.is_empty() {
            self.persist_suggestion(&suggestion).await;
        }

        state.escalation = Some(EscalationRecord {
            problem,
            suggestion: suggestion.clone(),
            status,
            asked_at: chrono::Utc::now().to_rfc3339(),
        });
        state.suggestion = Some(suggestion.clone());
        state.last_action_result = Some("Integrated escalation suggestion.".to_string());
        state.last_action_status = Some(ActionStatus::Success);
        self.store
            .append(
                id,
                &state.delta(&[
                    "suggestion",
                    "escalation",
                    "last_action_result",
                    "last_action_status",
                ]),
            )
            .await?;

        send_event(&self.events, LoopEvent::Escalated { status, suggestion });
        Ok(RecoveryOutcome::Escalated)
    }

    async fn persist_suggestion(&self, suggestion: &str) {
        let path = self.workspace.join(SUGGESTION_FILE);
        let result = async {
            tokio::fs::create_dir_all(&self.workspace).await?;
            tokio::fs::write(&path, suggestion).await
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), "Failed to persist suggestion: {}", e);
        }
    }
}
