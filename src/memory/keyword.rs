//! 关键词检索：按查询词与记录文本的词重叠数打分（无真实向量）

use std::collections::HashSet;

use serde_json::Value;

use crate::memory::Record;

/// 将文本切分为小写词集合，用于简单相似度（词重叠数）
pub fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| c.is_whitespace() || c == ',' || c == '.' || c == ':' || c == '"')
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// 收集 JSON 文档中所有字符串叶子，拼成一段文本
fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}

/// 对记录按词重叠打分，过滤零分，按分数降序（同分保持写入顺序）取前 k 条
pub fn rank(records: Vec<Record>, query: &str, k: usize) -> Vec<Record> {
    let query_tokens = tokenize_lower(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(usize, Record)> = records
        .into_iter()
        .map(|r| {
            let mut text = String::new();
            collect_text(&r.content, &mut text);
            let score = query_tokens.intersection(&tokenize_lower(&text)).count();
            (score, r)
        })
        .filter(|(s, _)| *s > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(k).map(|(_, r)| r).collect()
}
