//! Shell 执行器：白名单命令，禁止危险操作
//!
//! 仅允许配置中的命令名（首词）；禁止 rm -rf、wget、chmod 777 等子串。
//! 命令在工作区目录下经 sh -c 执行，返回结构化结果 {stdout, stderr, exit_code}，
//! 输出只保留末尾 OUTPUT_LIMIT 个字符；超时或无法启动时 exit_code 为 -1。

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::Tool;

/// stdout / stderr 各自保留的最大字符数
pub const OUTPUT_LIMIT: usize = 10_000;

/// 禁止的子串（即使命令名在白名单中也拒绝）
const FORBIDDEN_SUBSTR: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r",
    "wget ",
    "curl | sh",
    "chmod 777",
    "chmod +s",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    ":(){ :|:& };:", // fork bomb
];

/// Shell 工具：仅允许白名单内命令，在 workdir 下执行
pub struct ShellTool {
    allowed_commands: HashSet<String>,
    timeout: Duration,
    workdir: PathBuf,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>, timeout_secs: u64, workdir: impl Into<PathBuf>) -> Self {
        let allowed_commands = allowed_commands
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        Self {
            allowed_commands,
            timeout: Duration::from_secs(timeout_secs),
            workdir: workdir.into(),
        }
    }

    fn command_name(raw: &str) -> &str {
        raw.split_whitespace().next().unwrap_or("")
    }

    fn is_allowed(&self, raw: &str) -> Result<(), String> {
        let raw_lower = raw.to_lowercase();
        for forbidden in FORBIDDEN_SUBSTR {
            if raw_lower.contains(forbidden) {
                return Err(format!("Forbidden pattern: {}", forbidden));
            }
        }
        let name = Self::command_name(&raw_lower);
        if name.is_empty() {
            return Err("Empty command".to_string());
        }
        if self.allowed_commands.contains(name) {
            return Ok(());
        }
        Err(format!("Command '{}' not in allowlist", name))
    }

    /// 执行命令；除白名单拒绝外总是返回结构化结果
    pub async fn run(&self, command: &str) -> Value {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command])
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => command_result(
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
                output.status.code().unwrap_or(-1),
            ),
            Ok(Err(e)) => command_result("", &format!("Execution failed: {}", e), -1),
            Err(_) => command_result(
                "",
                &format!("Command timed out after {}s", self.timeout.as_secs()),
                -1,
            ),
        }
    }
}

fn tail_chars(s: &str, limit: usize) -> String {
    let count = s.chars().count();
    if count <= limit {
        s.to_string()
    } else {
        s.chars().skip(count - limit).collect()
    }
}

fn command_result(stdout: &str, stderr: &str, exit_code: i32) -> Value {
    serde_json::json!({
        "stdout": tail_chars(stdout, OUTPUT_LIMIT),
        "stderr": tail_chars(stderr, OUTPUT_LIMIT),
        "exit_code": exit_code,
    })
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a whitelisted shell command inside the workspace. Returns {stdout, stderr, exit_code}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute (must be in allowlist)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        self.is_allowed(command)?;

        tracing::info!(command = %command, "shell tool execute");
        Ok(self.run(command).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tool(dir: &TempDir) -> ShellTool {
        ShellTool::new(vec!["echo".into(), "ls".into(), "sh".into()], 5, dir.path())
    }

    #[test]
    fn test_allowlist() {
        let dir = TempDir::new().unwrap();
        let t = tool(&dir);
        assert!(t.is_allowed("echo hi").is_ok());
        assert!(t.is_allowed("curl http://x").is_err());
        assert!(t.is_allowed("ls; rm -rf /").is_err());
        assert!(t.is_allowed("   ").is_err());
    }

    #[tokio::test]
    async fn test_runs_in_workdir_with_exit_code() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let t = tool(&dir);

        let out = t.execute(serde_json::json!({"command": "ls"})).await.unwrap();
        assert_eq!(out["exit_code"], 0);
        assert!(out["stdout"].as_str().unwrap().contains("marker.txt"));

        let out = t
            .execute(serde_json::json!({"command": "sh -c 'echo oops >&2; exit 3'"}))
            .await
            .unwrap();
        assert_eq!(out["exit_code"], 3);
        assert!(out["stderr"].as_str().unwrap().contains("oops"));
    }

    #[test]
    fn test_tail_keeps_end() {
        let long = "a".repeat(OUTPUT_LIMIT) + "END";
        let kept = tail_chars(&long, OUTPUT_LIMIT);
        assert_eq!(kept.chars().count(), OUTPUT_LIMIT);
        assert!(kept.ends_with("END"));
    }
}
