//! Hive - 单目标任务编排器
//!
//! 给定一个自然语言目标：分解为计划 → 按能力分派每个步骤 → 失败时反思、修正计划、重跑 →
//! 仍失败则向上级 Oracle 求助。全部状态以增量写入会话日志，可从崩溃中续跑。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 状态、错误、执行循环、恢复管理、编排器与构建器
//! - **dispatch**: 能力路由、Worker 调用与结果归一化
//! - **escalation**: 上级求助（外部命令 / LLM）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 记忆服务（内存 / JSONL）、会话日志、共享知识库
//! - **observability**: 日志初始化
//! - **plan**: 目标分解、失败分析、修正计划
//! - **tools**: 沙箱工具（文件读写、目录列表、Shell）
//! - **workers**: 按能力执行步骤的 Worker

pub mod config;
pub mod core;
pub mod dispatch;
pub mod escalation;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod plan;
pub mod tools;
pub mod workers;

pub use crate::core::{Orchestrator, OrchestratorBuilder, SessionOutcome, SessionReport};
