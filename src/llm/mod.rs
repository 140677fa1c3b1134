//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Groq / Mock）

pub mod groq;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use groq::{create_groq_client, GROQ_BASE_URL, GROQ_DEFAULT_MODEL};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, Message, Role};

use crate::config::LlmSection;

/// 按配置与环境变量选择 LLM 后端；没有可用的 API Key 时退回 Mock
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    let has_groq = std::env::var("GROQ_API_KEY").is_ok();
    let has_openai = std::env::var("OPENAI_API_KEY").is_ok();

    match provider.as_str() {
        "groq" if has_groq => {
            let client = create_groq_client(cfg.model.as_deref(), cfg.base_url.as_deref());
            tracing::info!("Using Groq LLM ({})", client.model_name());
            Arc::new(client)
        }
        "openai" if has_openai => {
            let model = cfg.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            tracing::info!("Using OpenAI LLM ({})", model);
            Arc::new(OpenAiClient::new(cfg.base_url.as_deref(), &model, None))
        }
        "mock" => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient)
        }
        _ => {
            tracing::warn!(
                "No API key set for provider '{}' or provider unknown, using Mock LLM",
                provider
            );
            Arc::new(MockLlmClient)
        }
    }
}
