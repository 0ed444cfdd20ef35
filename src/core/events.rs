//! 编排过程事件：供 CLI 打印进度（也可序列化为 JSON 推给其它前端）

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::ActionStatus;
use crate::dispatch::CapabilityTag;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// 新计划生效（replanned 为 true 表示修正计划）
    PlanCreated { steps: Vec<String>, replanned: bool },
    /// 一个步骤执行完毕
    StepFinished {
        index: usize,
        step: String,
        capability: CapabilityTag,
        status: ActionStatus,
    },
    /// 步骤失败，循环停止
    Failed { step: String, error: String },
    /// 计划全部完成
    Done { steps: usize },
    /// 进入恢复流程
    RecoveryStarted { error: String },
    /// 已向 Oracle 求助
    Escalated { status: ActionStatus, suggestion: String },
    /// 写入一条经验
    LessonRecorded { lesson_id: String },
}

impl fmt::Display for LoopEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopEvent::PlanCreated { steps, replanned } => {
                let label = if *replanned { "Corrected plan" } else { "Plan" };
                write!(f, "{} ({} steps):", label, steps.len())?;
                for (i, s) in steps.iter().enumerate() {
                    write!(f, "\n  {}. {}", i + 1, s)?;
                }
                Ok(())
            }
            LoopEvent::StepFinished {
                index,
                step,
                capability,
                status,
            } => write!(f, "[{}] step {} ({}): {}", status, index + 1, capability, step),
            LoopEvent::Failed { step, error } => write!(f, "Step failed: {} -> {}", step, error),
            LoopEvent::Done { steps } => write!(f, "All {} steps completed", steps),
            LoopEvent::RecoveryStarted { error } => write!(f, "Recovering from: {}", error),
            LoopEvent::Escalated { status, suggestion } => {
                write!(f, "Escalated [{}]: {}", status, preview(suggestion, 200))
            }
            LoopEvent::LessonRecorded { lesson_id } => write!(f, "Lesson recorded: {}", lesson_id),
        }
    }
}

fn preview(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 发送事件；接收端已关闭时忽略
pub(crate) fn send_event(tx: &Option<UnboundedSender<LoopEvent>>, event: LoopEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}
