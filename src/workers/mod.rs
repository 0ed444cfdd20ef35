//! Worker 层：按能力标签执行单个步骤

pub mod agent;
pub mod registry;

use std::path::Path;
use std::sync::Arc;

use crate::config::ShellSection;
use crate::dispatch::CapabilityTag;
use crate::llm::LlmClient;
use crate::tools::{command_tools, file_tools};

pub use agent::{AnalysisWorker, ToolAgentWorker};
pub use registry::{Worker, WorkerPool};

/// 默认 Worker 池：file_ops / command_exec 用带工具的 Worker，analysis 用纯 LLM
pub fn default_pool(llm: Arc<dyn LlmClient>, workspace: &Path, shell: &ShellSection) -> WorkerPool {
    let mut pool = WorkerPool::new();
    pool.bind(
        CapabilityTag::FileOps,
        ToolAgentWorker::new(llm.clone(), file_tools(workspace), "file operations"),
    )
    .bind(
        CapabilityTag::CommandExec,
        ToolAgentWorker::new(llm.clone(), command_tools(workspace, shell), "command execution"),
    )
    .bind(CapabilityTag::Analysis, AnalysisWorker::new(llm));
    pool
}
