//! 编排器集成测试：脚本化 LLM + 假 Worker + 内存记忆服务，驱动完整流程

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use hive::config::AppConfig;
use hive::core::{
    ActionStatus, HiveError, LoopEvent, LoopState, PlanError, SessionOutcome, StateDelta,
    SUGGESTION_FILE,
};
use hive::dispatch::{CapabilityTag, WorkerOutput};
use hive::escalation::EscalationOracle;
use hive::llm::ScriptedLlmClient;
use hive::memory::{InMemoryMemoryService, Lesson, MemoryService};
use hive::workers::{Worker, WorkerPool};
use hive::{Orchestrator, OrchestratorBuilder};

/// 步骤含 "fail" 时返回 ERROR 文本，否则成功；记录每次调用
#[derive(Clone, Default)]
struct StepWorker {
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Worker for StepWorker {
    async fn invoke(&self, step: &str, _context: Option<&str>) -> Result<WorkerOutput, String> {
        self.calls.lock().unwrap().push(step.to_string());
        if step.to_lowercase().contains("fail") {
            Ok(WorkerOutput::Text(format!("ERROR: could not {}", step)))
        } else {
            Ok(WorkerOutput::Text(format!("done: {}", step)))
        }
    }
}

struct FakeOracle {
    reply: Result<String, String>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EscalationOracle for FakeOracle {
    async fn ask(&self, _problem: &str) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.reply.clone()
    }
}

struct Harness {
    dir: TempDir,
    memory: Arc<InMemoryMemoryService>,
    llm: Arc<ScriptedLlmClient>,
    worker: StepWorker,
    oracle_calls: Arc<AtomicUsize>,
    events: tokio::sync::mpsc::UnboundedReceiver<LoopEvent>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn events(&mut self) -> Vec<LoopEvent> {
        let mut out = Vec::new();
        while let Ok(e) = self.events.try_recv() {
            out.push(e);
        }
        out
    }
}

fn config(dir: &TempDir, oracle_timeout_secs: u64) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.app.workspace_root = Some(dir.path().join("workspace"));
    cfg.app.data_dir = Some(dir.path().join("data"));
    cfg.workers.timeout_secs = 5;
    cfg.escalation.timeout_secs = oracle_timeout_secs;
    cfg
}

fn harness_with(llm: ScriptedLlmClient, oracle_reply: Result<String, String>, oracle_delay: Duration) -> Harness {
    let dir = TempDir::new().unwrap();
    let memory = Arc::new(InMemoryMemoryService::new());
    let llm = Arc::new(llm);
    let worker = StepWorker::default();
    let oracle_calls = Arc::new(AtomicUsize::new(0));
    let (tx, events) = tokio::sync::mpsc::unbounded_channel();

    let mut pool = WorkerPool::new();
    pool.bind(CapabilityTag::FileOps, worker.clone())
        .bind(CapabilityTag::CommandExec, worker.clone())
        .bind(CapabilityTag::Analysis, worker.clone());

    let orchestrator = OrchestratorBuilder::new(config(&dir, 1))
        .with_memory(memory.clone())
        .with_llm(llm.clone())
        .with_workers(pool)
        .with_oracle(Arc::new(FakeOracle {
            reply: oracle_reply,
            delay: oracle_delay,
            calls: oracle_calls.clone(),
        }))
        .with_events(tx)
        .build()
        .unwrap();

    Harness {
        dir,
        memory,
        llm,
        worker,
        oracle_calls,
        events,
        orchestrator,
    }
}

fn harness(llm: ScriptedLlmClient) -> Harness {
    harness_with(llm, Ok("Create the missing file first.".into()), Duration::ZERO)
}

#[tokio::test]
async fn test_all_success_plan_runs_each_step_once() {
    let mut h = harness(ScriptedLlmClient::new([
        "1. Summarize alpha\n2. Summarize beta\n3. Summarize gamma",
    ]));

    let report = h.orchestrator.run("summarize three things").await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(report.state.phase, LoopState::Done);
    assert_eq!(report.state.step_index, 3);
    assert_eq!(
        *h.worker.calls.lock().unwrap(),
        vec!["Summarize alpha", "Summarize beta", "Summarize gamma"]
    );
    let finished = h
        .events()
        .into_iter()
        .filter(|e| matches!(e, LoopEvent::StepFinished { .. }))
        .count();
    assert_eq!(finished, 3);
    assert_eq!(h.oracle_calls.load(Ordering::SeqCst), 0);

    let snapshot = h.orchestrator.store().snapshot(&report.session_id).await.unwrap();
    assert_eq!(snapshot["current_step"], 3);
    assert_eq!(snapshot["phase"], "DONE");
    assert_eq!(snapshot["goal"], "summarize three things");
}

#[tokio::test]
async fn test_always_failing_plan_replans_once_and_escalates_once() {
    let h = harness(ScriptedLlmClient::new([
        "1. Fail to open the config",
        "The config does not exist.",
        "1. Fail to open the config again",
    ]));

    let report = h.orchestrator.run("load the config").await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Escalated);
    assert_eq!(h.oracle_calls.load(Ordering::SeqCst), 1);
    // decompose + analyze + replan
    assert_eq!(h.llm.prompts().len(), 3);
    assert_eq!(h.worker.calls.lock().unwrap().len(), 2);

    let state = &report.state;
    assert_eq!(state.analysis.as_deref(), Some("The config does not exist."));
    assert_eq!(state.suggestion.as_deref(), Some("Create the missing file first."));
    assert_eq!(state.last_action_status, Some(ActionStatus::Success));
    assert_eq!(
        state.last_action_result.as_deref(),
        Some("Integrated escalation suggestion.")
    );
    let record = state.escalation.as_ref().unwrap();
    assert_eq!(record.status, ActionStatus::Success);
    assert!(record.problem.starts_with("Goal: load the config\nProblem: ERROR: could not"));

    let written =
        std::fs::read_to_string(h.dir.path().join("workspace").join(SUGGESTION_FILE)).unwrap();
    assert_eq!(written, "Create the missing file first.");
}

#[tokio::test]
async fn test_recovered_run_records_exactly_one_lesson() {
    let mut h = harness(ScriptedLlmClient::new([
        "1. Summarize the notes\n2. Fail to read notes.txt",
        "notes.txt is missing",
        "1. Write notes.txt\n2. Summarize the notes",
    ]));

    let report = h.orchestrator.run("summarize the notes").await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Recovered);
    assert_eq!(report.state.step_index, 2);
    assert_eq!(h.oracle_calls.load(Ordering::SeqCst), 0);

    let records = h.memory.records(&report.session_id, "codex").await.unwrap();
    assert_eq!(records.len(), 1);
    let lesson: Lesson = serde_json::from_value(records[0].content.clone()).unwrap();
    assert_eq!(
        lesson.failure_pattern,
        vec!["Summarize the notes", "Fail to read notes.txt"]
    );
    assert_eq!(
        lesson.successful_resolution,
        vec!["Write notes.txt", "Summarize the notes"]
    );
    assert!(lesson.problem_signature.starts_with("ERROR: could not Fail to read"));
    assert_eq!(lesson.human_guidance, "none");

    assert!(h
        .events()
        .iter()
        .any(|e| matches!(e, LoopEvent::LessonRecorded { lesson_id } if *lesson_id == lesson.lesson_id)));
}

#[tokio::test]
async fn test_lessons_become_hints_for_later_goals() {
    let h = harness(ScriptedLlmClient::new([
        "1. Fail to read notes.txt",
        "notes.txt is missing",
        "1. Write notes.txt",
        "1. Write notes.txt\n2. Summarize notes.txt",
    ]));

    let first = h.orchestrator.run("summarize notes").await.unwrap();
    assert_eq!(first.outcome, SessionOutcome::Recovered);

    let second = h.orchestrator.run("summarize notes again").await.unwrap();
    assert_eq!(second.outcome, SessionOutcome::Completed);
    let prompts = h.llm.prompts();
    assert!(prompts[3].contains("this plan worked: Write notes.txt"));
}

#[tokio::test]
async fn test_resume_rebuilds_state_then_recovers() {
    let h = harness(ScriptedLlmClient::new([
        "The worker crashed mid-step.",
        "1. Summarize b",
    ]));
    let store = h.orchestrator.store();

    let id = store.start().await.unwrap();
    store
        .append(
            &id,
            &StateDelta::new()
                .set("goal", "process a and b")
                .set("current_plan", vec!["a", "b"])
                .set("current_step", 1)
                .set("last_action", "a")
                .set("crash_log", "process killed"),
        )
        .await
        .unwrap();

    let rebuilt = store.recover(&id).await.unwrap();
    assert_eq!(rebuilt.goal, "process a and b");
    assert_eq!(rebuilt.plan.as_ref().unwrap().steps(), &["a", "b"]);
    assert_eq!(rebuilt.step_index, 1);
    assert!(h.worker.calls.lock().unwrap().is_empty());

    let report = h.orchestrator.resume(id.clone()).await.unwrap();
    assert_eq!(report.session_id, id);
    assert_eq!(report.outcome, SessionOutcome::Recovered);
    let first_prompt = &h.llm.prompts()[0];
    assert!(first_prompt.contains("Original Goal: process a and b"));
    assert!(first_prompt.contains("Last Action: a"));
    assert!(first_prompt.contains("Error: process killed"));
    assert_eq!(*h.worker.calls.lock().unwrap(), vec!["Summarize b"]);
}

#[tokio::test]
async fn test_resume_of_recovered_session_keeps_single_replan_and_lesson() {
    let h = harness(ScriptedLlmClient::new([
        "1. Summarize a\n2. Fail to read b",
        "b is missing",
        "1. Summarize a",
        "second analysis",
        "1. Summarize a again",
    ]));

    let report = h.orchestrator.run("summarize a and b").await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Recovered);
    assert!(report.state.replanned);

    let resumed = h.orchestrator.resume(report.session_id.clone()).await.unwrap();
    assert_eq!(resumed.outcome, SessionOutcome::Recovered);
    // decompose + analyze + replan, nothing from the resume
    assert_eq!(h.llm.prompts().len(), 3);
    assert_eq!(h.oracle_calls.load(Ordering::SeqCst), 0);
    let records = h.memory.records(&report.session_id, "codex").await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_resume_crashed_revised_run_escalates_without_second_replan() {
    let h = harness(ScriptedLlmClient::new(["unused analysis", "1. unused plan"]));
    let store = h.orchestrator.store();

    let id = store.start().await.unwrap();
    store
        .append(
            &id,
            &StateDelta::new()
                .set("goal", "ship it")
                .set("phase", "RUNNING")
                .set("replanned", true)
                .set("current_plan", vec!["build", "upload"])
                .set("current_step", 1)
                .set("crash_log", "process killed during upload"),
        )
        .await
        .unwrap();

    let report = h.orchestrator.resume(id.clone()).await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Escalated);
    assert!(h.llm.prompts().is_empty());
    assert!(h.worker.calls.lock().unwrap().is_empty());
    assert_eq!(h.oracle_calls.load(Ordering::SeqCst), 1);
    let record = report.state.escalation.unwrap();
    assert!(record.problem.contains("process killed during upload"));

    let snapshot = store.snapshot(&id).await.unwrap();
    assert_eq!(snapshot["suggestion"], "Create the missing file first.");
}

#[tokio::test]
async fn test_resume_unknown_session() {
    let h = harness(ScriptedLlmClient::default());
    let err = h.orchestrator.resume("no-such-session".into()).await.unwrap_err();
    assert!(matches!(err, HiveError::NoResumableSession(_)));
}

#[tokio::test]
async fn test_resume_after_escalation_does_nothing() {
    let h = harness(ScriptedLlmClient::new([
        "1. Fail once",
        "analysis",
        "1. Fail twice",
    ]));
    let report = h.orchestrator.run("doomed").await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Escalated);

    let resumed = h.orchestrator.resume(report.session_id).await.unwrap();
    assert_eq!(resumed.outcome, SessionOutcome::Escalated);
    assert_eq!(h.oracle_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.llm.prompts().len(), 3);
}

#[tokio::test]
async fn test_replan_fault_goes_straight_to_escalation() {
    let h = harness(
        ScriptedLlmClient::new(["1. Fail to deploy", "deploy target unreachable"]).then_fail("LLM offline"),
    );

    let report = h.orchestrator.run("deploy").await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Escalated);
    assert_eq!(h.oracle_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.worker.calls.lock().unwrap().len(), 1);
    assert!(report.state.error.unwrap().starts_with("Replan failed"));
}

#[tokio::test]
async fn test_oracle_timeout_is_recorded_not_fatal() {
    let h = harness_with(
        ScriptedLlmClient::new(["1. Fail a", "analysis", "1. Fail b"]),
        Ok("too late".into()),
        Duration::from_secs(10),
    );

    let report = h.orchestrator.run("slow oracle").await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Escalated);
    let record = report.state.escalation.unwrap();
    assert_eq!(record.status, ActionStatus::Failure);
    assert_eq!(record.suggestion, "Escalation timed out after 1s");
}

#[tokio::test]
async fn test_oracle_error_becomes_suggestion_text() {
    let h = harness_with(
        ScriptedLlmClient::new(["1. Fail a", "analysis", "1. Fail b"]),
        Err("gemini not installed".into()),
        Duration::ZERO,
    );

    let report = h.orchestrator.run("broken oracle").await.unwrap();
    assert_eq!(
        report.state.suggestion.as_deref(),
        Some("Escalation failed: gemini not installed")
    );
    assert_eq!(report.state.escalation.unwrap().status, ActionStatus::Failure);
}

#[tokio::test]
async fn test_planning_fault_is_fatal_and_leaves_crash_log() {
    let h = harness(ScriptedLlmClient::default().then_fail("LLM offline"));

    let err = h.orchestrator.run("anything").await.unwrap_err();
    assert!(matches!(err, HiveError::Plan(PlanError::Llm(_))));

    let id = h.orchestrator.store().last_session_id().await.unwrap();
    let snapshot = h.orchestrator.store().snapshot(&id).await.unwrap();
    assert!(snapshot["crash_log"].as_str().unwrap().contains("LLM offline"));
}

#[tokio::test]
async fn test_empty_goal_is_rejected_before_session() {
    let h = harness(ScriptedLlmClient::default());
    let err = h.orchestrator.run("   ").await.unwrap_err();
    assert!(matches!(err, HiveError::Plan(PlanError::EmptyGoal)));
    assert!(h.orchestrator.store().last_session_id().await.is_none());
}
