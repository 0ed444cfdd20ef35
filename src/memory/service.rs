//! 记忆服务契约
//!
//! 会话日志（私有命名空间，如 scratchpad）与共享知识库（共享命名空间，如 codex）都走同一个接口：
//! create_session / create_shared_namespace / append / records / search / share。
//! 记录是任意 JSON 文档，服务只负责按唯一 id 追加与检索，不约束字段。

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::MemoryError;
use crate::memory::keyword;

/// 会话 ID（不透明字符串，新建时为 uuid v4）
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 一条追加记录：id 唯一，写入后不可修改
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub session_id: SessionId,
    pub recorded_at: String,
    pub content: Value,
}

impl Record {
    pub fn new(session_id: &SessionId, content: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            recorded_at: chrono::Utc::now().to_rfc3339(),
            content,
        }
    }
}

/// 记忆服务 trait
///
/// 命名空间解析规则：若存在同名共享命名空间，则要求会话已被 share，否则 AccessDenied；
/// 否则视为该会话的私有命名空间（首次 append 时隐式创建）。
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// 新建会话，返回新 ID
    async fn create_session(&self) -> Result<SessionId, MemoryError>;

    /// 会话是否存在
    async fn session_exists(&self, session: &SessionId) -> Result<bool, MemoryError>;

    /// 创建共享命名空间；已存在时为 no-op
    async fn create_shared_namespace(&self, name: &str) -> Result<(), MemoryError>;

    /// 追加一条记录；返回前必须已持久化
    async fn append(
        &self,
        session: &SessionId,
        namespace: &str,
        content: Value,
    ) -> Result<Record, MemoryError>;

    /// 按写入顺序返回命名空间内全部记录
    async fn records(&self, session: &SessionId, namespace: &str)
        -> Result<Vec<Record>, MemoryError>;

    /// 授权某会话读写共享命名空间
    async fn share(&self, namespace: &str, with: &SessionId) -> Result<(), MemoryError>;

    /// 关键词检索，返回最相关的 limit 条；默认实现基于 records 的词重叠打分
    async fn search(
        &self,
        session: &SessionId,
        namespace: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Record>, MemoryError> {
        let records = self.records(session, namespace).await?;
        Ok(keyword::rank(records, query, limit))
    }
}

/// 命名空间名只允许字母、数字、`-`、`_`（同时也是文件名）
pub(crate) fn validate_namespace(name: &str) -> Result<(), MemoryError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(MemoryError::NamespaceNotFound(name.to_string()))
    }
}
