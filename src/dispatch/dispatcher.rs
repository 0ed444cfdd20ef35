//! Dispatcher：路由 + 调用 Worker + 归一化
//!
//! 每次调用在独立任务中执行并施加超时：Worker 返回 Err、panic 或超时都转成 FAILURE 的 StepOutcome，
//! 不会作为错误逃出 execute；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::dispatch::{is_read_like, normalize, route, CapabilityTag, PriorOutcome, StepOutcome};
use crate::workers::WorkerPool;

pub struct Dispatcher {
    workers: Arc<WorkerPool>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(workers: WorkerPool, timeout_secs: u64) -> Self {
        Self {
            workers: Arc::new(workers),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn route(&self, step: &str) -> CapabilityTag {
        route(step)
    }

    /// 分析类步骤且上一步是读操作时，把上一步结果作为附加上下文
    fn extra_context(capability: CapabilityTag, prior: Option<&PriorOutcome>) -> Option<String> {
        match (capability, prior) {
            (CapabilityTag::Analysis, Some(p)) if is_read_like(&p.step) && !p.result.is_empty() => {
                Some(p.result.clone())
            }
            _ => None,
        }
    }

    pub async fn execute(&self, step: &str, prior: Option<&PriorOutcome>) -> StepOutcome {
        let capability = self.route(step);
        let context = Self::extra_context(capability, prior);
        let start = Instant::now();

        let workers = self.workers.clone();
        let step_owned = step.to_string();
        let mut handle = tokio::spawn(async move {
            workers
                .invoke(capability, &step_owned, context.as_deref())
                .await
        });

        let (outcome, label) = match timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(output))) => (normalize(step, capability, output), "ok"),
            Ok(Ok(Err(e))) => (StepOutcome::failure(step, capability, e), "error"),
            Ok(Err(join_err)) => (
                StepOutcome::failure(step, capability, format!("Worker crashed: {}", join_err)),
                "panic",
            ),
            Err(_) => {
                handle.abort();
                (
                    StepOutcome::failure(
                        step,
                        capability,
                        format!("Worker timed out after {}s", self.timeout.as_secs()),
                    ),
                    "timeout",
                )
            }
        };

        let audit = serde_json::json!({
            "event": "step_audit",
            "capability": capability.to_string(),
            "status": outcome.status.to_string(),
            "outcome": label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "step_preview": preview(step),
        });
        tracing::info!(audit = %audit.to_string(), "dispatch");

        outcome
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}
