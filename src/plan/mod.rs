//! 规划层：目标分解、失败分析、修正计划

pub mod parse;
pub mod planner;

pub use parse::parse_plan;
pub use planner::Planner;
