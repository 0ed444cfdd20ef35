//! DeepSeek 预设：OpenAI 兼容端点 + 默认模型

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 可用的 API Key：`DEEPSEEK_API_KEY` 优先，其次 `OPENAI_API_KEY`
pub fn deepseek_api_key() -> Option<String> {
    std::env::var("DEEPSEEK_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|k| !k.trim().is_empty())
}

/// 空模型名回落到 deepseek-chat
fn model_or_default(model: &str) -> &str {
    if model.trim().is_empty() {
        DEEPSEEK_CHAT
    } else {
        model
    }
}

/// 创建 DeepSeek 客户端；没有 API Key 时返回 None，由调用方决定回落策略
pub fn create_deepseek_client(model: &str, request_timeout_secs: u64) -> Option<OpenAiClient> {
    let key = deepseek_api_key()?;
    let client = OpenAiClient::new(Some(DEEPSEEK_BASE_URL), model_or_default(model), Some(&key))
        .with_request_timeout(request_timeout_secs);
    Some(client)
}
