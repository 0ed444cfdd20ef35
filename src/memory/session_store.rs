//! Session Store：会话身份与 scratchpad 增量日志
//!
//! - start：在记忆服务中新建会话，并把共享知识库命名空间 share 给它；同时写入 last_session_id 指针文件
//! - append：把一条状态增量追加到会话的 scratchpad（返回前已落盘）
//! - snapshot / recover：按写入顺序合并全部增量（后写覆盖先写），得到最后的持久状态

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::core::{MemoryError, SessionState, StateDelta};
use crate::memory::{MemoryService, SessionId};

/// 会话私有日志命名空间
pub const SCRATCHPAD: &str = "scratchpad";

/// 指针文件名（位于数据目录下）
pub const LAST_SESSION_FILE: &str = "last_session_id.txt";

pub struct SessionStore {
    memory: Arc<dyn MemoryService>,
    knowledge_namespace: String,
    pointer: Option<PathBuf>,
}

impl SessionStore {
    pub fn new(memory: Arc<dyn MemoryService>, knowledge_namespace: impl Into<String>) -> Self {
        Self {
            memory,
            knowledge_namespace: knowledge_namespace.into(),
            pointer: None,
        }
    }

    /// 启用 last_session_id 指针文件
    pub fn with_pointer_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pointer = Some(path.into());
        self
    }

    pub fn memory(&self) -> &Arc<dyn MemoryService> {
        &self.memory
    }

    pub fn knowledge_namespace(&self) -> &str {
        &self.knowledge_namespace
    }

    /// 新建会话；指针文件写入失败只告警
    pub async fn start(&self) -> Result<SessionId, MemoryError> {
        let id = self.memory.create_session().await?;
        self.memory
            .create_shared_namespace(&self.knowledge_namespace)
            .await?;
        self.memory.share(&self.knowledge_namespace, &id).await?;

        if let Some(pointer) = &self.pointer {
            if let Err(e) = write_pointer(pointer, &id).await {
                tracing::warn!(path = %pointer.display(), "Failed to record last session id: {}", e);
            }
        }
        tracing::info!(session = %id, "Session started");
        Ok(id)
    }

    /// 追加一条状态增量
    pub async fn append(&self, id: &SessionId, delta: &StateDelta) -> Result<(), MemoryError> {
        if delta.is_empty() {
            return Ok(());
        }
        self.memory
            .append(id, SCRATCHPAD, delta.clone().into_value())
            .await?;
        Ok(())
    }

    /// 合并后的原始键值视图；会话不存在或日志为空时为 SessionNotFound
    pub async fn snapshot(&self, id: &SessionId) -> Result<Map<String, Value>, MemoryError> {
        if !self.memory.session_exists(id).await? {
            return Err(MemoryError::SessionNotFound(id.to_string()));
        }
        let records = self.memory.records(id, SCRATCHPAD).await?;
        if records.is_empty() {
            return Err(MemoryError::SessionNotFound(id.to_string()));
        }
        let mut snapshot = Map::new();
        for record in records {
            match record.content {
                Value::Object(map) => StateDelta::from(map).merge_into(&mut snapshot),
                other => tracing::warn!(session = %id, "skip non-object delta: {}", other),
            }
        }
        Ok(snapshot)
    }

    /// 重建最后的持久状态
    pub async fn recover(&self, id: &SessionId) -> Result<SessionState, MemoryError> {
        let snapshot = self.snapshot(id).await?;
        let state = SessionState::from_snapshot(snapshot)?;
        tracing::info!(
            session = %id,
            step = state.step_index,
            plan_len = state.plan_len(),
            "Session state recovered"
        );
        Ok(state)
    }

    /// 最近一次 start 的会话 ID（无指针文件或内容为空时为 None）
    pub async fn last_session_id(&self) -> Option<SessionId> {
        let pointer = self.pointer.as_ref()?;
        let raw = tokio::fs::read_to_string(pointer).await.ok()?;
        let id = raw.trim();
        if id.is_empty() {
            None
        } else {
            Some(SessionId::from(id))
        }
    }
}

async fn write_pointer(path: &Path, id: &SessionId) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, id.as_str()).await
}
