//! 执行循环（状态机）
//!
//! NEED_PLAN → RUNNING：向 Planner 要计划（附带知识库中的相似经验），索引归零
//! RUNNING → RUNNING：当前步骤成功，索引 +1
//! RUNNING → FAILED：当前步骤失败，索引不动
//! RUNNING → DONE：索引 == 计划长度
//!
//! 每次转移先把增量写入 scratchpad，再评估下一次转移。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::core::events::send_event;
use crate::core::{HiveError, LoopEvent, LoopState, SessionState, PLAN_KEYS, STEP_KEYS};
use crate::dispatch::Dispatcher;
use crate::memory::{KnowledgeBase, SessionId, SessionStore};
use crate::plan::Planner;

pub struct ExecutionLoop {
    store: Arc<SessionStore>,
    planner: Arc<Planner>,
    dispatcher: Arc<Dispatcher>,
    knowledge: Arc<KnowledgeBase>,
    lesson_hints: usize,
    events: Option<UnboundedSender<LoopEvent>>,
}

impl ExecutionLoop {
    pub fn new(
        store: Arc<SessionStore>,
        planner: Arc<Planner>,
        dispatcher: Arc<Dispatcher>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Self {
        Self {
            store,
            planner,
            dispatcher,
            knowledge,
            lesson_hints: 0,
            events: None,
        }
    }

    /// 规划前注入的经验条数
    pub fn with_lesson_hints(mut self, k: usize) -> Self {
        self.lesson_hints = k;
        self
    }

    pub fn with_events(mut self, tx: UnboundedSender<LoopEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// 知识库检索失败不影响规划
    async fn hints(&self, id: &SessionId, goal: &str) -> Vec<String> {
        match self.knowledge.relevant_lessons(id, goal, self.lesson_hints).await {
            Ok(lessons) => lessons.iter().map(|l| l.to_hint()).collect(),
            Err(e) => {
                tracing::warn!(session = %id, "Lesson lookup failed: {}", e);
                Vec::new()
            }
        }
    }

    /// 运行到 DONE 或 FAILED；状态中已有计划时直接从当前索引继续
    pub async fn run(&self, id: &SessionId, state: &mut SessionState) -> Result<LoopState, HiveError> {
        if state.plan.is_none() {
            state.phase = LoopState::NeedPlan;
            let hints = self.hints(id, &state.goal).await;
            let plan = self.planner.decompose(&state.goal, &hints).await?;
            send_event(
                &self.events,
                LoopEvent::PlanCreated {
                    steps: plan.steps().to_vec(),
                    replanned: false,
                },
            );
            state.set_plan(plan);
            state.phase = LoopState::Running;
            self.store.append(id, &state.delta(PLAN_KEYS)).await?;
            tracing::info!(session = %id, steps = state.plan_len(), "NEED_PLAN -> RUNNING");
        }
        state.phase = LoopState::Running;

        loop {
            let Some(step) = state.current_step().map(String::from) else {
                state.phase = LoopState::Done;
                self.store.append(id, &state.delta(&["phase"])).await?;
                tracing::info!(session = %id, steps = state.plan_len(), "RUNNING -> DONE");
                send_event(&self.events, LoopEvent::Done { steps: state.plan_len() });
                return Ok(LoopState::Done);
            };

            let index = state.step_index;
            let prior = state.prior_outcome();
            let outcome = self.dispatcher.execute(&step, prior.as_ref()).await;
            state.apply_outcome(&outcome);
            if !outcome.is_success() {
                state.phase = LoopState::Failed;
            }
            self.store.append(id, &state.delta(STEP_KEYS)).await?;

            tracing::info!(
                session = %id,
                step = index + 1,
                capability = %outcome.capability,
                status = %outcome.status,
                "Step finished"
            );
            send_event(
                &self.events,
                LoopEvent::StepFinished {
                    index,
                    step: step.clone(),
                    capability: outcome.capability,
                    status: outcome.status,
                },
            );

            if state.phase == LoopState::Failed {
                let error = outcome.error.unwrap_or_default();
                tracing::warn!(session = %id, step = %step, error = %error, "RUNNING -> FAILED");
                send_event(&self.events, LoopEvent::Failed { step, error });
                return Ok(LoopState::Failed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActionStatus;
    use crate::dispatch::{CapabilityTag, WorkerOutput};
    use crate::llm::ScriptedLlmClient;
    use crate::memory::{InMemoryMemoryService, MemoryService, SCRATCHPAD};
    use crate::workers::{Worker, WorkerPool};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 记录收到的上下文；含 broken 的步骤返回非零 exit_code，含 patch 的步骤带 diff
    #[derive(Clone, Default)]
    struct Recorder {
        contexts: Arc<Mutex<Vec<Option<String>>>>,
    }

    #[async_trait]
    impl Worker for Recorder {
        async fn invoke(&self, step: &str, context: Option<&str>) -> Result<WorkerOutput, String> {
            self.contexts.lock().unwrap().push(context.map(String::from));
            match (step.contains("patch"), step.contains("broken")) {
                (true, true) => Ok(WorkerOutput::Structured(
                    serde_json::json!({"exit_code": 1, "diff": "-x\n+y\n"}),
                )),
                (true, false) => Ok(WorkerOutput::Structured(
                    serde_json::json!({"result": "File written successfully.", "diff": "-a\n+b\n"}),
                )),
                (false, true) => Ok(WorkerOutput::Structured(serde_json::json!({"exit_code": 2}))),
                (false, false) => Ok(WorkerOutput::Text(format!("out of {}", step))),
            }
        }
    }

    async fn setup(reply: &str) -> (ExecutionLoop, Arc<SessionStore>, Arc<dyn MemoryService>, SessionId, Recorder) {
        let memory: Arc<dyn MemoryService> = Arc::new(InMemoryMemoryService::new());
        let store = Arc::new(SessionStore::new(memory.clone(), "codex"));
        let id = store.start().await.unwrap();
        let recorder = Recorder::default();
        let mut pool = WorkerPool::new();
        pool.bind(CapabilityTag::FileOps, recorder.clone())
            .bind(CapabilityTag::CommandExec, recorder.clone())
            .bind(CapabilityTag::Analysis, recorder.clone());
        let exec = ExecutionLoop::new(
            store.clone(),
            Arc::new(Planner::new(Arc::new(ScriptedLlmClient::new([reply.to_string()])))),
            Arc::new(Dispatcher::new(pool, 5)),
            Arc::new(KnowledgeBase::new(memory.clone(), "codex")),
        )
        .with_lesson_hints(3);
        (exec, store, memory, id, recorder)
    }

    #[tokio::test]
    async fn test_read_result_flows_into_analysis() {
        let (exec, _, _, id, recorder) = setup("1. Read notes.txt\n2. Summarize them").await;
        let mut state = SessionState::new("summarize notes");

        assert_eq!(exec.run(&id, &mut state).await.unwrap(), LoopState::Done);
        let contexts = recorder.contexts.lock().unwrap();
        assert_eq!(contexts[0], None);
        assert_eq!(contexts[1].as_deref(), Some("out of Read notes.txt"));
    }

    #[tokio::test]
    async fn test_failure_holds_index_and_logs_each_transition() {
        let (exec, store, memory, id, _) = setup("1. Summarize a\n2. Run the broken script\n3. Summarize b").await;
        let mut state = SessionState::new("g");

        assert_eq!(exec.run(&id, &mut state).await.unwrap(), LoopState::Failed);
        assert_eq!(state.step_index, 1);
        assert_eq!(state.last_action_status, Some(ActionStatus::Failure));
        assert_eq!(state.error.as_deref(), Some("Command returned exit code 2"));

        // 计划一条 + 两步各一条
        let records = memory.records(&id, SCRATCHPAD).await.unwrap();
        assert_eq!(records.len(), 3);
        let snapshot = store.snapshot(&id).await.unwrap();
        assert_eq!(snapshot["phase"], "FAILED");
        assert_eq!(snapshot["current_step"], 1);
        assert_eq!(snapshot["last_action"], "Run the broken script");
    }

    #[tokio::test]
    async fn test_worker_diff_reaches_session_log() {
        let (exec, store, memory, id, _) = setup("1. Save the patch\n2. Save the broken patch").await;
        let mut state = SessionState::new("apply patches");

        assert_eq!(exec.run(&id, &mut state).await.unwrap(), LoopState::Failed);
        let records = memory.records(&id, SCRATCHPAD).await.unwrap();
        // 计划、成功步骤、失败步骤
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].content["last_action_status"], "SUCCESS");
        assert_eq!(records[1].content["last_file_diff"], "-a\n+b\n");
        assert_eq!(records[2].content["last_action_status"], "FAILURE");
        assert_eq!(records[2].content["last_file_diff"], "-x\n+y\n");

        let snapshot = store.snapshot(&id).await.unwrap();
        assert_eq!(snapshot["last_file_diff"], "-x\n+y\n");
        assert_eq!(snapshot["error"], "Command returned exit code 1");
    }
}
