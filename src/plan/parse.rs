//! 计划文本解析：把 LLM 的编号 / 列表回复拆成纯步骤描述

use std::sync::OnceLock;

use regex::Regex;

use crate::core::Plan;

static STEP_MARKUP_RE: OnceLock<Regex> = OnceLock::new();

/// 行首的编号或列表标记：`1.` `2)` `3:` `-` `*` `•` `Step 3:`
fn step_markup() -> &'static Regex {
    STEP_MARKUP_RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:step\s*\d+\s*[:.)\-]?\s*|\d+\s*[.):\-]\s*|[-*•](?:\s+|$))").unwrap()
    })
}

/// 去掉单行的编号 / 列表标记；返回 (是否带标记, 剩余文本)
fn strip_markup(line: &str) -> (bool, &str) {
    let trimmed = line.trim();
    match step_markup().find(trimmed) {
        Some(m) => (true, trimmed[m.end()..].trim()),
        None => (false, trimmed),
    }
}

/// 解析计划文本：保持原顺序，去掉空行与标记
///
/// 只要有一行带编号 / 列表标记，未带标记的行（如开场白 "Here is the plan:"）一律丢弃。
pub fn parse_plan(text: &str) -> Plan {
    let lines: Vec<(bool, &str)> = text
        .lines()
        .map(strip_markup)
        .filter(|(_, s)| !s.is_empty())
        .collect();
    let any_marked = lines.iter().any(|(marked, _)| *marked);
    lines
        .into_iter()
        .filter(|(marked, _)| *marked || !any_marked)
        .map(|(_, s)| s.to_string())
        .collect()
}
