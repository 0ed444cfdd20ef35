//! Tool Call 解析
//!
//! Worker 让 LLM 以 JSON（{"tool": "...", "args": {...}}）选择工具；parse_tool_call 从回复中提取 JSON，
//! 解析为 ToolCall，否则视为直接回答。

use serde::{Deserialize, Serialize};

/// LLM 返回的 Tool Call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum LlmReply {
    /// 直接回答
    Answer(String),
    /// 需要执行工具
    ToolCall(ToolCall),
}

/// 解析 LLM 输出：含有效 JSON 且 tool 非空则为 ToolCall，否则为 Answer
///
/// 回复明显是 JSON（```json 块或以 `{` 开头）却无法解析时返回 Err。
pub fn parse_tool_call(output: &str) -> Result<LlmReply, String> {
    let trimmed = output.trim();

    let (json_str, explicit) = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let body = rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim());
        (body, true)
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            (&trimmed[start..=end], start == 0)
        } else {
            return Ok(LlmReply::Answer(trimmed.to_string()));
        }
    } else {
        return Ok(LlmReply::Answer(trimmed.to_string()));
    };

    match serde_json::from_str::<ToolCall>(json_str) {
        Ok(call) if !call.tool.trim().is_empty() => Ok(LlmReply::ToolCall(call)),
        Ok(_) => Ok(LlmReply::Answer(trimmed.to_string())),
        Err(e) if explicit => Err(format!("Malformed tool call: {}: {}", e, json_str)),
        Err(_) => Ok(LlmReply::Answer(trimmed.to_string())),
    }
}
