//! 共享知识库：跨会话的经验（Lesson）
//!
//! 只有"失败后修正计划成功"才会产生一条 Lesson；写入后不再修改。
//! 规划前按目标检索相似经验，作为提示交给 Planner。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{MemoryError, Plan};
use crate::memory::{MemoryService, SessionId};

/// 经验记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_id: String,
    pub problem_signature: String,
    /// 失败的计划（原样）
    pub failure_pattern: Vec<String>,
    /// 成功的修正计划（原样）
    pub successful_resolution: Vec<String>,
    pub human_guidance: String,
    pub confidence_score: f64,
    pub recorded_at: String,
}

impl Lesson {
    pub fn new(problem_signature: impl Into<String>, failed: &Plan, succeeded: &Plan) -> Self {
        Self {
            lesson_id: uuid::Uuid::new_v4().to_string(),
            problem_signature: problem_signature.into(),
            failure_pattern: failed.steps().to_vec(),
            successful_resolution: succeeded.steps().to_vec(),
            human_guidance: "none".to_string(),
            confidence_score: 0.9,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// 给 Planner 的一行提示
    pub fn to_hint(&self) -> String {
        format!(
            "When \"{}\" happened, this plan worked: {}",
            self.problem_signature,
            self.successful_resolution.join("; ")
        )
    }
}

pub struct KnowledgeBase {
    memory: Arc<dyn MemoryService>,
    namespace: String,
}

impl KnowledgeBase {
    pub fn new(memory: Arc<dyn MemoryService>, namespace: impl Into<String>) -> Self {
        Self {
            memory,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn record_lesson(&self, session: &SessionId, lesson: &Lesson) -> Result<(), MemoryError> {
        let content = serde_json::to_value(lesson)?;
        self.memory.append(session, &self.namespace, content).await?;
        tracing::info!(lesson_id = %lesson.lesson_id, "Lesson recorded");
        Ok(())
    }

    /// 与目标最相关的 k 条经验；无法解析的记录跳过
    pub async fn relevant_lessons(
        &self,
        session: &SessionId,
        goal: &str,
        k: usize,
    ) -> Result<Vec<Lesson>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let records = self.memory.search(session, &self.namespace, goal, k).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| serde_json::from_value(r.content).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryMemoryService, SessionStore};

    #[tokio::test]
    async fn test_lesson_shape() {
        let lesson = Lesson::new(
            "Read failed: No such file",
            &Plan::from_iter(["Read notes.txt"]),
            &Plan::from_iter(["Write notes.txt", "Read notes.txt"]),
        );
        let v = serde_json::to_value(&lesson).unwrap();
        assert_eq!(v["human_guidance"], "none");
        assert_eq!(v["confidence_score"], 0.9);
        assert_eq!(v["failure_pattern"], serde_json::json!(["Read notes.txt"]));
        assert!(uuid::Uuid::parse_str(&lesson.lesson_id).is_ok());
    }

    #[tokio::test]
    async fn test_lessons_shared_across_sessions() {
        let memory: Arc<dyn MemoryService> = Arc::new(InMemoryMemoryService::new());
        let store = SessionStore::new(memory.clone(), "codex");
        let kb = KnowledgeBase::new(memory, "codex");

        let first = store.start().await.unwrap();
        let lesson = Lesson::new(
            "notes file missing",
            &Plan::from_iter(["Read notes.txt"]),
            &Plan::from_iter(["Create notes file", "Read notes.txt"]),
        );
        kb.record_lesson(&first, &lesson).await.unwrap();

        let second = store.start().await.unwrap();
        let found = kb.relevant_lessons(&second, "summarize the notes", 3).await.unwrap();
        assert_eq!(found, vec![lesson]);
        assert!(found[0].to_hint().contains("Create notes file; Read notes.txt"));

        assert!(kb.relevant_lessons(&second, "deploy", 3).await.unwrap().is_empty());
    }
}
