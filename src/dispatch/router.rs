//! 能力路由：按声明顺序的关键词表把步骤描述分类到能力标签
//!
//! 纯函数、无隐藏状态。表中靠前的能力优先：同时命中 FileOps 与 CommandExec 关键词时归 FileOps，
//! 与命中的关键词个数或位置无关。都不命中时归默认能力 Analysis。

use serde::{Deserialize, Serialize};

/// 能力标签
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTag {
    FileOps,
    CommandExec,
    Analysis,
}

impl std::fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityTag::FileOps => write!(f, "file_ops"),
            CapabilityTag::CommandExec => write!(f, "command_exec"),
            CapabilityTag::Analysis => write!(f, "analysis"),
        }
    }
}

/// 路由表：按优先级排列（能力, 触发关键词）
pub const ROUTING_TABLE: &[(CapabilityTag, &[&str])] = &[
    (
        CapabilityTag::FileOps,
        &["file", "read", "write", "open", "save"],
    ),
    (
        CapabilityTag::CommandExec,
        &["shell", "command", "execute", "run"],
    ),
];

/// 未命中任何关键词时的能力
pub const DEFAULT_CAPABILITY: CapabilityTag = CapabilityTag::Analysis;

/// 关键词按大小写无关的子串匹配
pub fn route(step: &str) -> CapabilityTag {
    let lower = step.to_lowercase();
    ROUTING_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(tag, _)| *tag)
        .unwrap_or(DEFAULT_CAPABILITY)
}

/// 读类步骤：其结果可作为下一个分析步骤的上下文
pub fn is_read_like(step: &str) -> bool {
    step.to_lowercase().contains("read")
}
