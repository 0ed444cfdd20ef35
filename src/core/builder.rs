//! 编排器构建器：统一的初始化逻辑
//!
//! 默认按配置构建全部协作者（JSONL 记忆服务、LLM、Worker 池、Oracle）；
//! 测试或嵌入方可用 with_* 逐个替换。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppConfig;
use crate::core::{ExecutionLoop, HiveError, LoopEvent, Orchestrator, RecoveryManager};
use crate::dispatch::{CapabilityTag, Dispatcher};
use crate::escalation::{create_oracle, EscalationOracle};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::memory::{FileMemoryService, KnowledgeBase, MemoryService, SessionStore, LAST_SESSION_FILE};
use crate::plan::Planner;
use crate::workers::{default_pool, WorkerPool};

pub struct OrchestratorBuilder {
    config: AppConfig,
    memory: Option<Arc<dyn MemoryService>>,
    llm: Option<Arc<dyn LlmClient>>,
    workers: Option<WorkerPool>,
    oracle: Option<Arc<dyn EscalationOracle>>,
    events: Option<UnboundedSender<LoopEvent>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            memory: None,
            llm: None,
            workers: None,
            oracle: None,
            events: None,
        }
    }

    /// 替换记忆服务（默认：数据目录下的 JSONL 文件）
    pub fn with_memory(mut self, memory: Arc<dyn MemoryService>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// 替换规划 / 分析用的 LLM（默认 Worker 也用它）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_workers(mut self, workers: WorkerPool) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn EscalationOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// 订阅进度事件
    pub fn with_events(mut self, tx: UnboundedSender<LoopEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn workspace(&self) -> PathBuf {
        self.config.app.workspace_root()
    }

    pub fn build(self) -> Result<Orchestrator, HiveError> {
        let workspace = self.workspace();
        let data_dir = self.config.app.data_dir();
        for dir in [&workspace, &data_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| HiveError::Config(format!("cannot create {}: {}", dir.display(), e)))?;
        }

        let memory = self
            .memory
            .unwrap_or_else(|| Arc::new(FileMemoryService::new(data_dir.join("memory"))));
        let llm = self
            .llm
            .unwrap_or_else(|| create_llm_from_config(&self.config.llm, None));
        let workers = self
            .workers
            .unwrap_or_else(|| default_pool(llm.clone(), &workspace, &self.config.workers.shell));
        for tag in [CapabilityTag::FileOps, CapabilityTag::CommandExec, CapabilityTag::Analysis] {
            if !workers.is_bound(tag) {
                tracing::warn!(capability = %tag, "No worker bound; steps routed here will fail");
            }
        }
        let oracle = self
            .oracle
            .unwrap_or_else(|| create_oracle(&self.config.escalation, &self.config.llm));

        let namespace = self.config.knowledge.namespace.clone();
        let store = Arc::new(
            SessionStore::new(memory.clone(), namespace.clone())
                .with_pointer_file(data_dir.join(LAST_SESSION_FILE)),
        );
        let knowledge = Arc::new(KnowledgeBase::new(memory, namespace));
        let planner = Arc::new(Planner::new(llm));
        let dispatcher = Arc::new(Dispatcher::new(workers, self.config.workers.timeout_secs));

        let mut exec = ExecutionLoop::new(store.clone(), planner.clone(), dispatcher, knowledge.clone())
            .with_lesson_hints(self.config.knowledge.lesson_hints);
        let mut recovery = RecoveryManager::new(store.clone(), planner, knowledge, oracle, workspace)
            .with_oracle_timeout(self.config.escalation.timeout_secs);
        if let Some(tx) = self.events {
            exec = exec.with_events(tx.clone());
            recovery = recovery.with_events(tx);
        }

        tracing::info!(
            provider = %self.config.llm.provider,
            escalation = %self.config.escalation.provider,
            "Orchestrator built"
        );
        Ok(Orchestrator::new(store, exec, recovery))
    }
}
