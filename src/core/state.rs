//! 会话状态：显式类型化的字段（目标、计划、步骤索引、上一步结果、错误、分析、升级建议）
//!
//! 状态以增量（StateDelta）形式写入 scratchpad；恢复时按顺序合并全部增量再反序列化回 SessionState。
//! 字段的 serde 名即日志中的键名，None 序列化为 null，重放时会清空对应字段。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dispatch::{PriorOutcome, StepOutcome};

/// 单步执行结果状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Success,
    Failure,
}

impl ActionStatus {
    pub fn is_success(self) -> bool {
        self == ActionStatus::Success
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Success => write!(f, "SUCCESS"),
            ActionStatus::Failure => write!(f, "FAILURE"),
        }
    }
}

/// 执行循环的状态机阶段
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    #[default]
    NeedPlan,
    Running,
    Done,
    Failed,
}

/// 计划：有序的步骤描述，创建后不可修改（新计划整体替换旧计划）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan(Vec<String>);

impl Plan {
    pub fn new(steps: Vec<String>) -> Self {
        Self(steps)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn steps(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for Plan {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// 升级记录：发给 Oracle 的问题与收到的建议；每个会话至多一条
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub problem: String,
    pub suggestion: String,
    /// Oracle 调用本身是否成功（超时 / 报错为 FAILURE）
    pub status: ActionStatus,
    pub asked_at: String,
}

/// 会话状态
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub goal: String,
    #[serde(rename = "current_plan")]
    pub plan: Option<Plan>,
    #[serde(rename = "current_step")]
    pub step_index: usize,
    pub phase: LoopState,
    /// 是否已用过唯一一次修正计划（续跑时据此跳过再次修正）
    pub replanned: bool,
    pub last_action: Option<String>,
    pub last_action_status: Option<ActionStatus>,
    pub last_action_result: Option<String>,
    pub last_file_diff: Option<String>,
    pub error: Option<String>,
    pub analysis: Option<String>,
    pub crash_log: Option<String>,
    pub suggestion: Option<String>,
    pub escalation: Option<EscalationRecord>,
}

/// 每次步骤转移写入的键
pub const STEP_KEYS: &[&str] = &[
    "phase",
    "current_step",
    "last_action",
    "last_action_status",
    "last_action_result",
    "error",
    "last_file_diff",
];

/// 新计划生效时写入的键
pub const PLAN_KEYS: &[&str] = &[
    "phase",
    "replanned",
    "current_plan",
    "current_step",
    "last_action",
    "last_action_status",
    "last_action_result",
    "error",
    "last_file_diff",
];

impl SessionState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Self::default()
        }
    }

    /// 由合并后的快照重建状态；未知键忽略，缺失键取默认值
    pub fn from_snapshot(snapshot: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(snapshot))
    }

    /// 当前步骤描述（计划缺失或已执行完时为 None）
    pub fn current_step(&self) -> Option<&str> {
        self.plan.as_ref().and_then(|p| p.get(self.step_index))
    }

    pub fn plan_len(&self) -> usize {
        self.plan.as_ref().map(Plan::len).unwrap_or(0)
    }

    /// 设置新计划：索引归零，清空上一步的动作 / 状态 / 错误
    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = Some(plan);
        self.step_index = 0;
        self.last_action = None;
        self.last_action_status = None;
        self.last_action_result = None;
        self.last_file_diff = None;
        self.error = None;
    }

    /// 记录一步的结果；成功时索引前进一位，失败时停在当前步骤
    pub fn apply_outcome(&mut self, outcome: &StepOutcome) {
        self.last_action = Some(outcome.step.clone());
        self.last_action_status = Some(outcome.status);
        self.last_action_result = Some(outcome.result.render());
        self.last_file_diff = outcome.diff.clone();
        self.error = outcome.error.clone();
        if outcome.status.is_success() {
            self.step_index += 1;
        }
    }

    /// 上一步成功时的动作与结果，供 Dispatcher 作为分析类步骤的上下文
    pub fn prior_outcome(&self) -> Option<PriorOutcome> {
        if self.last_action_status != Some(ActionStatus::Success) {
            return None;
        }
        match (&self.last_action, &self.last_action_result) {
            (Some(step), Some(result)) => Some(PriorOutcome {
                step: step.clone(),
                result: result.clone(),
            }),
            _ => None,
        }
    }

    /// 从当前状态中挑出指定键，组成一条增量
    pub fn delta(&self, keys: &[&str]) -> StateDelta {
        let full = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let mut delta = StateDelta::new();
        for key in keys {
            if let Some(v) = full.get(*key) {
                delta.0.insert((*key).to_string(), v.clone());
            }
        }
        delta
    }
}

/// 状态增量：写入 scratchpad 的部分状态（任意 JSON 键值）
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDelta(Map<String, Value>);

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置一个键；值原样写入日志
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 合并到快照：同名键后写覆盖先写
    pub fn merge_into(&self, snapshot: &mut Map<String, Value>) {
        for (k, v) in &self.0 {
            snapshot.insert(k.clone(), v.clone());
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for StateDelta {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
