//! 步骤结果与归一化规则
//!
//! Worker 的原始输出（文本或 JSON 文档）经 normalize 变成统一的 StepOutcome：
//! 1. 文本以 "ERROR" 开头 → FAILURE，error 为原文
//! 2. 结构化结果（或可解析为 JSON 对象的文本）含 exit_code → 非零即 FAILURE
//! 3. 其余 → SUCCESS
//! 4. 结构化结果含 diff 时无论成败都带出

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ActionStatus;
use crate::dispatch::CapabilityTag;

/// Worker 原始输出
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerOutput {
    Text(String),
    Structured(Value),
}

impl WorkerOutput {
    /// 渲染为文本（写入状态的 last_action_result）
    pub fn render(&self) -> String {
        match self {
            WorkerOutput::Text(s) => s.clone(),
            WorkerOutput::Structured(v) => v.to_string(),
        }
    }
}

impl From<Value> for WorkerOutput {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => WorkerOutput::Text(s),
            other => WorkerOutput::Structured(other),
        }
    }
}

/// 上一步的动作与结果（作为分析类步骤的上下文）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriorOutcome {
    pub step: String,
    pub result: String,
}

/// 单步执行结果，记录后不可修改
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub capability: CapabilityTag,
    pub status: ActionStatus,
    pub result: WorkerOutput,
    pub error: Option<String>,
    pub diff: Option<String>,
}

impl StepOutcome {
    /// Worker 故障（报错 / panic / 超时）转成的失败结果
    pub fn failure(step: &str, capability: CapabilityTag, error: impl Into<String>) -> Self {
        Self {
            step: step.to_string(),
            capability,
            status: ActionStatus::Failure,
            result: WorkerOutput::Text(String::new()),
            error: Some(error.into()),
            diff: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// 文本若整体是 JSON 对象则解析出来（有些 Worker 把结构化结果序列化成字符串返回）
fn parse_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(Value::is_object)
}

/// exit_code 可能是数字或数字字符串；无法识别时按 0 处理
fn exit_code_of(v: &Value) -> i64 {
    v.as_i64()
        .or_else(|| v.as_f64().map(|f| f as i64))
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        .unwrap_or(0)
}

/// 归一化 Worker 输出
pub fn normalize(step: &str, capability: CapabilityTag, output: WorkerOutput) -> StepOutcome {
    // JSON 字符串与纯文本同等对待
    let output = match output {
        WorkerOutput::Structured(Value::String(s)) => WorkerOutput::Text(s),
        other => other,
    };
    let parsed;
    let structured = match &output {
        WorkerOutput::Structured(v) => Some(v),
        WorkerOutput::Text(t) => {
            parsed = parse_json_object(t);
            parsed.as_ref()
        }
    };

    let diff = structured
        .and_then(|v| v.get("diff"))
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .map(String::from);

    let (status, error) = match &output {
        WorkerOutput::Text(t) if t.trim_start().starts_with("ERROR") => {
            (ActionStatus::Failure, Some(t.clone()))
        }
        _ => match structured.and_then(|v| v.get("exit_code")).map(exit_code_of) {
            Some(code) if code != 0 => (
                ActionStatus::Failure,
                Some(format!("Command returned exit code {}", code)),
            ),
            _ => (ActionStatus::Success, None),
        },
    };

    StepOutcome {
        step: step.to_string(),
        capability,
        status,
        result: output,
        error,
        diff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(output: WorkerOutput) -> StepOutcome {
        normalize("step", CapabilityTag::CommandExec, output)
    }

    #[test]
    fn test_error_marker_text() {
        let o = run(WorkerOutput::Text("ERROR: disk full".into()));
        assert_eq!(o.status, ActionStatus::Failure);
        assert_eq!(o.error.as_deref(), Some("ERROR: disk full"));
    }

    #[test]
    fn test_error_marker_in_json_string() {
        let o = run(WorkerOutput::Structured(json!("ERROR: permission denied")));
        assert_eq!(o.status, ActionStatus::Failure);
        assert_eq!(o.error.as_deref(), Some("ERROR: permission denied"));
        assert_eq!(o.result, WorkerOutput::Text("ERROR: permission denied".into()));
    }

    #[test]
    fn test_error_marker_must_lead() {
        let o = run(WorkerOutput::Text("no ERROR here".into()));
        assert_eq!(o.status, ActionStatus::Success);
        assert!(o.error.is_none());
    }

    #[test]
    fn test_nonzero_exit_code() {
        let o = run(WorkerOutput::Structured(json!({"exit_code": 2})));
        assert_eq!(o.status, ActionStatus::Failure);
        assert!(o.error.unwrap().contains('2'));
    }

    #[test]
    fn test_zero_exit_code() {
        let o = run(WorkerOutput::Structured(json!({"exit_code": 0, "stdout": "ok"})));
        assert_eq!(o.status, ActionStatus::Success);
        assert!(o.error.is_none());
    }

    #[test]
    fn test_exit_code_inside_text_json() {
        let o = run(WorkerOutput::Text(r#"{"stdout": "", "exit_code": 127}"#.into()));
        assert_eq!(o.status, ActionStatus::Failure);
        assert_eq!(o.error.as_deref(), Some("Command returned exit code 127"));
    }

    #[test]
    fn test_diff_propagates_regardless_of_status() {
        let ok = run(WorkerOutput::Structured(
            json!({"result": "File written successfully.", "diff": "-a\n+b\n"}),
        ));
        assert_eq!(ok.status, ActionStatus::Success);
        assert_eq!(ok.diff.as_deref(), Some("-a\n+b\n"));

        let failed = run(WorkerOutput::Structured(json!({"exit_code": 1, "diff": "-x\n+y\n"})));
        assert_eq!(failed.status, ActionStatus::Failure);
        assert_eq!(failed.diff.as_deref(), Some("-x\n+y\n"));
    }

    #[test]
    fn test_worker_output_from_value() {
        assert_eq!(
            WorkerOutput::from(json!("plain")),
            WorkerOutput::Text("plain".into())
        );
        assert!(matches!(
            WorkerOutput::from(json!({"a": 1})),
            WorkerOutput::Structured(_)
        ));
    }
}
