//! 内置 Worker
//!
//! - ToolAgentWorker：LLM 读工具 schema，选一个工具调用（JSON）并执行；工具报错转为 "ERROR: ..." 文本，
//!   交给 normalize 判定为 FAILURE。LLM 直接回答时原样返回。
//! - AnalysisWorker：纯 LLM 分析，附加上下文放在 "Content:" 之后。

use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::WorkerOutput;
use crate::llm::{LlmClient, Message};
use crate::tools::{parse_tool_call, LlmReply, ToolRegistry};
use crate::workers::Worker;

fn tool_system_prompt(role: &str, tools: &ToolRegistry) -> String {
    format!(
        "You are a {role} worker. Complete the task with exactly one tool call.\n\
         Available tools:\n{schema}\n\n\
         Reply ONLY with JSON: {{\"tool\": \"<name>\", \"args\": {{...}}}}.\n\
         All paths are relative to the workspace.",
        role = role,
        schema = tools.to_schema_json()
    )
}

/// 带工具的 Worker（文件操作、命令执行）
pub struct ToolAgentWorker {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    system_prompt: String,
}

impl ToolAgentWorker {
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, role: &str) -> Self {
        let system_prompt = tool_system_prompt(role, &tools);
        Self {
            llm,
            tools,
            system_prompt,
        }
    }
}

#[async_trait]
impl Worker for ToolAgentWorker {
    async fn invoke(&self, step: &str, context: Option<&str>) -> Result<WorkerOutput, String> {
        let mut task = format!("Task: {}", step);
        if let Some(ctx) = context {
            task.push_str("\nContext:\n");
            task.push_str(ctx);
        }
        let messages = [Message::system(self.system_prompt.clone()), Message::user(task)];
        let reply = self.llm.complete(&messages).await?;

        match parse_tool_call(&reply) {
            Ok(LlmReply::Answer(text)) => Ok(WorkerOutput::Text(text)),
            Ok(LlmReply::ToolCall(call)) => {
                tracing::debug!(tool = %call.tool, "worker tool call");
                match self.tools.execute(&call.tool, call.args).await {
                    Ok(value) => Ok(WorkerOutput::from(value)),
                    Err(e) => Ok(WorkerOutput::Text(format!("ERROR: {}", e))),
                }
            }
            Err(e) => Ok(WorkerOutput::Text(format!("ERROR: {}", e))),
        }
    }
}

/// 分析 Worker
pub struct AnalysisWorker {
    llm: Arc<dyn LlmClient>,
}

impl AnalysisWorker {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Worker for AnalysisWorker {
    async fn invoke(&self, step: &str, context: Option<&str>) -> Result<WorkerOutput, String> {
        let prompt = match context {
            Some(ctx) => format!("{}\nContent:\n{}", step, ctx),
            None => step.to_string(),
        };
        let reply = self.llm.complete(&[Message::user(prompt)]).await?;
        Ok(WorkerOutput::Text(reply))
    }
}
