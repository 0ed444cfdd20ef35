//! Escalation Oracle：本地恢复失败后的上级求助
//!
//! - CommandOracle：外部 CLI（问题经 stdin 传入，取 stdout）
//! - LlmOracle：独立的（通常更强的）模型
//! - NoOracle：不升级，调用即返回失败描述
//!
//! 超时由调用方（RecoveryManager）统一施加；CommandOracle 设置 kill_on_drop，超时丢弃 future 即结束子进程。

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::llm::{LlmClient, Message};

#[async_trait]
pub trait EscalationOracle: Send + Sync {
    /// 提交问题，返回建议文本
    async fn ask(&self, problem: &str) -> Result<String, String>;
}

/// 外部命令 Oracle
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
}

impl CommandOracle {
    /// `command[0]` 为程序，其余为参数
    pub fn new(command: &[String]) -> Result<Self, String> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| "Escalation command is empty".to_string())?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl EscalationOracle for CommandOracle {
    async fn ask(&self, problem: &str) -> Result<String, String> {
        tracing::info!(program = %self.program, "Invoking escalation command");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to start {}: {}", self.program, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(problem.as_bytes())
                .await
                .map_err(|e| format!("Failed to send problem: {}", e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("Escalation command failed: {}", e))?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() && stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "Escalation command exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        Ok(stdout)
    }
}

/// 模型 Oracle
pub struct LlmOracle {
    llm: Arc<dyn LlmClient>,
}

impl LlmOracle {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl EscalationOracle for LlmOracle {
    async fn ask(&self, problem: &str) -> Result<String, String> {
        let messages = [
            Message::system(
                "You are a senior engineer helping an automated agent that failed twice. \
                 Give concrete guidance or code.",
            ),
            Message::user(problem),
        ];
        self.llm.complete(&messages).await
    }
}

/// 禁用升级
#[derive(Debug, Default)]
pub struct NoOracle;

#[async_trait]
impl EscalationOracle for NoOracle {
    async fn ask(&self, _problem: &str) -> Result<String, String> {
        Err("no escalation oracle configured".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    #[tokio::test]
    async fn test_command_oracle_reads_stdin() {
        let oracle = CommandOracle::new(&["cat".to_string()]).unwrap();
        let out = oracle.ask("Goal: g\nProblem: p\n").await.unwrap();
        assert_eq!(out, "Goal: g\nProblem: p");
    }

    #[tokio::test]
    async fn test_command_oracle_missing_program() {
        let oracle = CommandOracle::new(&["hive-no-such-program".to_string()]).unwrap();
        assert!(oracle.ask("x").await.unwrap_err().starts_with("Failed to start"));
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(CommandOracle::new(&[]).is_err());
    }

    #[tokio::test]
    async fn test_llm_oracle() {
        let llm = Arc::new(ScriptedLlmClient::new(["create the file first"]));
        let oracle = LlmOracle::new(llm.clone());
        assert_eq!(oracle.ask("problem").await.unwrap(), "create the file first");
        assert_eq!(llm.prompts(), vec!["problem".to_string()]);
    }
}
