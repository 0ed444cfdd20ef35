//! 内存版记忆服务：进程内 HashMap，适合测试与一次性运行（进程退出即丢失）

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::MemoryError;
use crate::memory::service::validate_namespace;
use crate::memory::{MemoryService, Record, SessionId};

#[derive(Default)]
struct SharedNamespace {
    members: HashSet<SessionId>,
    records: Vec<Record>,
}

#[derive(Default)]
struct Inner {
    /// 会话 -> 私有命名空间 -> 记录
    sessions: HashMap<SessionId, HashMap<String, Vec<Record>>>,
    shared: HashMap<String, SharedNamespace>,
}

/// 内存记忆服务；Clone 后共享同一份数据
#[derive(Clone, Default)]
pub struct InMemoryMemoryService {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn denied(session: &SessionId, namespace: &str) -> MemoryError {
    MemoryError::AccessDenied {
        session: session.to_string(),
        namespace: namespace.to_string(),
    }
}

#[async_trait]
impl MemoryService for InMemoryMemoryService {
    async fn create_session(&self) -> Result<SessionId, MemoryError> {
        let id = SessionId::generate();
        self.write().sessions.insert(id.clone(), HashMap::new());
        Ok(id)
    }

    async fn session_exists(&self, session: &SessionId) -> Result<bool, MemoryError> {
        Ok(self.read().sessions.contains_key(session))
    }

    async fn create_shared_namespace(&self, name: &str) -> Result<(), MemoryError> {
        validate_namespace(name)?;
        self.write().shared.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn append(
        &self,
        session: &SessionId,
        namespace: &str,
        content: Value,
    ) -> Result<Record, MemoryError> {
        validate_namespace(namespace)?;
        let record = Record::new(session, content);
        let mut inner = self.write();
        if let Some(shared) = inner.shared.get_mut(namespace) {
            if !shared.members.contains(session) {
                return Err(denied(session, namespace));
            }
            shared.records.push(record.clone());
            return Ok(record);
        }
        let spaces = inner
            .sessions
            .get_mut(session)
            .ok_or_else(|| MemoryError::SessionNotFound(session.to_string()))?;
        spaces
            .entry(namespace.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn records(
        &self,
        session: &SessionId,
        namespace: &str,
    ) -> Result<Vec<Record>, MemoryError> {
        validate_namespace(namespace)?;
        let inner = self.read();
        if let Some(shared) = inner.shared.get(namespace) {
            if !shared.members.contains(session) {
                return Err(denied(session, namespace));
            }
            return Ok(shared.records.clone());
        }
        let spaces = inner
            .sessions
            .get(session)
            .ok_or_else(|| MemoryError::SessionNotFound(session.to_string()))?;
        Ok(spaces.get(namespace).cloned().unwrap_or_default())
    }

    async fn share(&self, namespace: &str, with: &SessionId) -> Result<(), MemoryError> {
        let mut inner = self.write();
        if !inner.sessions.contains_key(with) {
            return Err(MemoryError::SessionNotFound(with.to_string()));
        }
        let shared = inner
            .shared
            .get_mut(namespace)
            .ok_or_else(|| MemoryError::NamespaceNotFound(namespace.to_string()))?;
        shared.members.insert(with.clone());
        Ok(())
    }
}
