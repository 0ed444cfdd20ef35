//! Planner：目标 → 计划，失败分析 → 修正计划
//!
//! 三个能力都只是一次 LLM 调用加上解析：
//! - decompose：目标（可附带过往经验提示）→ 编号步骤列表
//! - replan：失败分析作为前置上下文 → 修正后的步骤列表
//! - analyze：目标 + 上一步动作 + 错误 → 失败诊断文本

use std::sync::Arc;

use crate::core::{Plan, PlanError};
use crate::llm::{LlmClient, Message};
use crate::plan::parse_plan;

/// 规划器：持有用于规划 / 反思的 LLM
pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    async fn ask(&self, prompt: String) -> Result<String, PlanError> {
        self.llm
            .complete(&[Message::user(prompt)])
            .await
            .map_err(PlanError::Llm)
    }

    fn to_plan(reply: &str) -> Result<Plan, PlanError> {
        let plan = parse_plan(reply);
        if plan.is_empty() {
            return Err(PlanError::EmptyPlan);
        }
        Ok(plan)
    }

    /// 把目标分解为计划；`hints` 为知识库中相似目标的经验
    pub async fn decompose(&self, goal: &str, hints: &[String]) -> Result<Plan, PlanError> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(PlanError::EmptyGoal);
        }

        let mut prompt = String::from(
            "You are the Orchestrator. Decompose the following user goal into a sequence of steps.\n",
        );
        if !hints.is_empty() {
            prompt.push_str("Lessons from similar past goals:\n");
            for hint in hints {
                prompt.push_str("- ");
                prompt.push_str(hint);
                prompt.push('\n');
            }
        }
        prompt.push_str(&format!(
            "Goal: {}\nProvide a numbered list of concise steps to achieve this goal.",
            goal
        ));

        let reply = self.ask(prompt).await?;
        let plan = Self::to_plan(&reply)?;
        tracing::info!(steps = plan.len(), "Goal decomposed");
        Ok(plan)
    }

    /// 基于失败分析给出修正计划；分析非空时作为前置上下文
    pub async fn replan(&self, analysis: &str, goal: &str) -> Result<Plan, PlanError> {
        let mut prompt = String::new();
        if !analysis.trim().is_empty() {
            prompt.push_str(analysis.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!(
            "Given the above analysis of the failure, devise a corrected plan to achieve the goal.\n\
             Goal: {}\n\
             Provide a numbered list of concise steps.\n\
             New Plan:",
            goal
        ));

        let reply = self.ask(prompt).await?;
        let plan = Self::to_plan(&reply)?;
        tracing::info!(steps = plan.len(), "Corrected plan formulated");
        Ok(plan)
    }

    /// 失败诊断
    pub async fn analyze(&self, goal: &str, last_action: &str, error: &str) -> Result<String, PlanError> {
        let prompt = format!(
            "You are an expert debugging agent. The previous attempt to execute the plan failed.\n\
             Original Goal: {}\n\
             Last Action: {}\n\
             Error: {}\n\
             Analyze the cause of the failure and suggest a new plan or fix.",
            goal, last_action, error
        );
        self.ask(prompt).await
    }
}
