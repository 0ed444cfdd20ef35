//! 文件版记忆服务：JSONL 追加日志
//!
//! 目录布局（root = [app].data_dir）：
//! - sessions/<id>/            会话目录，存在即会话存在
//! - sessions/<id>/<ns>.jsonl  私有命名空间日志（如 scratchpad）
//! - shared/<ns>/records.jsonl 共享命名空间日志（如 codex）
//! - shared/<ns>/members       已授权的会话 ID，每行一个
//!
//! 每条记录序列化为单行，一次 write_all 追加并 fsync 后才返回；
//! 多个会话并发追加同一共享日志时依赖 O_APPEND 的整行原子性，记录以 uuid 区分，互不覆盖。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::core::MemoryError;
use crate::memory::service::validate_namespace;
use crate::memory::{MemoryService, Record, SessionId};

const RECORDS_FILE: &str = "records.jsonl";
const MEMBERS_FILE: &str = "members";

/// 基于本地目录的记忆服务
#[derive(Debug, Clone)]
pub struct FileMemoryService {
    root: PathBuf,
}

impl FileMemoryService {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session: &SessionId) -> PathBuf {
        self.root.join("sessions").join(session.as_str())
    }

    fn shared_dir(&self, namespace: &str) -> PathBuf {
        self.root.join("shared").join(namespace)
    }

    async fn is_shared(&self, namespace: &str) -> bool {
        fs::metadata(self.shared_dir(namespace)).await.is_ok()
    }

    async fn is_member(&self, namespace: &str, session: &SessionId) -> Result<bool, MemoryError> {
        let path = self.shared_dir(namespace).join(MEMBERS_FILE);
        match fs::read_to_string(&path).await {
            Ok(s) => Ok(s.lines().any(|l| l.trim() == session.as_str())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn require_session(&self, session: &SessionId) -> Result<(), MemoryError> {
        if self.session_exists(session).await? {
            Ok(())
        } else {
            Err(MemoryError::SessionNotFound(session.to_string()))
        }
    }

    /// 解析命名空间对应的日志文件（共享优先，需已授权）
    async fn log_path(&self, session: &SessionId, namespace: &str) -> Result<PathBuf, MemoryError> {
        validate_namespace(namespace)?;
        if self.is_shared(namespace).await {
            if !self.is_member(namespace, session).await? {
                return Err(MemoryError::AccessDenied {
                    session: session.to_string(),
                    namespace: namespace.to_string(),
                });
            }
            return Ok(self.shared_dir(namespace).join(RECORDS_FILE));
        }
        self.require_session(session).await?;
        Ok(self.session_dir(session).join(format!("{}.jsonl", namespace)))
    }
}

/// 追加一行并 fsync，保证返回时已落盘
async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(buf.as_bytes()).await?;
    file.sync_data().await
}

#[async_trait]
impl MemoryService for FileMemoryService {
    async fn create_session(&self) -> Result<SessionId, MemoryError> {
        let id = SessionId::generate();
        fs::create_dir_all(self.session_dir(&id)).await?;
        Ok(id)
    }

    async fn session_exists(&self, session: &SessionId) -> Result<bool, MemoryError> {
        if validate_namespace(session.as_str()).is_err() {
            return Ok(false);
        }
        Ok(fs::metadata(self.session_dir(session)).await.is_ok())
    }

    async fn create_shared_namespace(&self, name: &str) -> Result<(), MemoryError> {
        validate_namespace(name)?;
        fs::create_dir_all(self.shared_dir(name)).await?;
        Ok(())
    }

    async fn append(
        &self,
        session: &SessionId,
        namespace: &str,
        content: Value,
    ) -> Result<Record, MemoryError> {
        let path = self.log_path(session, namespace).await?;
        let record = Record::new(session, content);
        append_line(&path, &serde_json::to_string(&record)?).await?;
        tracing::debug!(session = %session, namespace, id = %record.id, "record appended");
        Ok(record)
    }

    async fn records(
        &self,
        session: &SessionId,
        namespace: &str,
    ) -> Result<Vec<Record>, MemoryError> {
        let path = self.log_path(session, namespace).await?;
        let data = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for (n, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(line) {
                Ok(r) => records.push(r),
                // 崩溃时可能留下半行，跳过并告警，不影响之前的历史
                Err(e) => tracing::warn!(path = %path.display(), line = n + 1, "skip corrupt record: {}", e),
            }
        }
        Ok(records)
    }

    async fn share(&self, namespace: &str, with: &SessionId) -> Result<(), MemoryError> {
        validate_namespace(namespace)?;
        if !self.is_shared(namespace).await {
            return Err(MemoryError::NamespaceNotFound(namespace.to_string()));
        }
        self.require_session(with).await?;
        if self.is_member(namespace, with).await? {
            return Ok(());
        }
        append_line(&self.shared_dir(namespace).join(MEMBERS_FILE), with.as_str()).await?;
        Ok(())
    }
}
