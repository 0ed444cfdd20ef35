//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::LlmSection;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT};
pub use message::{Message, Role};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::OpenAiClient;
pub use traits::LlmClient;

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
///
/// `model_override` 用于同一配置下构建不同模型的客户端（如升级求助用更强的模型）。
pub fn create_llm_from_config(cfg: &LlmSection, model_override: Option<&str>) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    let model = model_override.unwrap_or(&cfg.model);

    match provider.as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            return Arc::new(MockLlmClient);
        }
        "deepseek" => {
            if let Some(client) = create_deepseek_client(model, cfg.request_timeout_secs) {
                tracing::info!("Using DeepSeek LLM ({})", client.model());
                return Arc::new(client);
            }
        }
        "openai" if std::env::var("OPENAI_API_KEY").is_ok() => {
            tracing::info!("Using OpenAI LLM ({})", model);
            return Arc::new(
                OpenAiClient::new(cfg.base_url.as_deref(), model, None)
                    .with_request_timeout(cfg.request_timeout_secs),
            );
        }
        _ => {}
    }
    tracing::warn!(provider = %provider, "No API key set or provider unknown, using Mock LLM");
    Arc::new(MockLlmClient)
}
