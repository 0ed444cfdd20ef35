//! 升级层：本地恢复失败后的上级求助

pub mod oracle;

use std::sync::Arc;

use crate::config::{EscalationSection, LlmSection};
use crate::llm::create_llm_from_config;

pub use oracle::{CommandOracle, EscalationOracle, LlmOracle, NoOracle};

/// 根据 [escalation] 段构建 Oracle；命令为空时退化为 NoOracle
pub fn create_oracle(cfg: &EscalationSection, llm: &LlmSection) -> Arc<dyn EscalationOracle> {
    match cfg.provider.to_lowercase().as_str() {
        "command" => match CommandOracle::new(&cfg.command) {
            Ok(oracle) => Arc::new(oracle),
            Err(e) => {
                tracing::warn!("{}, escalation disabled", e);
                Arc::new(NoOracle)
            }
        },
        "llm" => Arc::new(LlmOracle::new(create_llm_from_config(llm, cfg.model.as_deref()))),
        "none" => Arc::new(NoOracle),
        other => {
            tracing::warn!(provider = %other, "Unknown escalation provider, escalation disabled");
            Arc::new(NoOracle)
        }
    }
}
