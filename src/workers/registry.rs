//! Worker trait 与 WorkerPool
//!
//! 每个能力标签绑定一个 Worker；Dispatcher 通过 WorkerPool::invoke 按标签调用。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::{CapabilityTag, WorkerOutput};

/// 执行单个步骤的 Worker；`context` 为可选的附加上下文（如上一步读到的内容）
#[async_trait]
pub trait Worker: Send + Sync {
    async fn invoke(&self, step: &str, context: Option<&str>) -> Result<WorkerOutput, String>;
}

/// 能力标签 → Worker
#[derive(Default, Clone)]
pub struct WorkerPool {
    workers: HashMap<CapabilityTag, Arc<dyn Worker>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定 Worker；同一标签重复绑定时后者覆盖前者
    pub fn bind(&mut self, tag: CapabilityTag, worker: impl Worker + 'static) -> &mut Self {
        self.workers.insert(tag, Arc::new(worker));
        self
    }

    pub fn is_bound(&self, tag: CapabilityTag) -> bool {
        self.workers.contains_key(&tag)
    }

    pub async fn invoke(
        &self,
        tag: CapabilityTag,
        step: &str,
        context: Option<&str>,
    ) -> Result<WorkerOutput, String> {
        let worker = self
            .workers
            .get(&tag)
            .ok_or_else(|| format!("No worker bound to capability {}", tag))?;
        worker.invoke(step, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl Worker for Echo {
        async fn invoke(&self, step: &str, _context: Option<&str>) -> Result<WorkerOutput, String> {
            Ok(WorkerOutput::Text(format!("{}:{}", self.0, step)))
        }
    }

    #[tokio::test]
    async fn test_rebind_replaces() {
        let mut pool = WorkerPool::new();
        pool.bind(CapabilityTag::Analysis, Echo("first"))
            .bind(CapabilityTag::Analysis, Echo("second"));
        let out = pool.invoke(CapabilityTag::Analysis, "x", None).await.unwrap();
        assert_eq!(out, WorkerOutput::Text("second:x".into()));
        assert!(!pool.is_bound(CapabilityTag::FileOps));
    }
}
