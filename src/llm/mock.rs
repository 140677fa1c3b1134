//! Mock LLM 客户端（用于测试与无 API Key 运行）
//!
//! 取最后一条 User 消息，按 RESPONSE / SENTIMENT / TOPIC 格式回显。

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!(
            "RESPONSE:\nEcho from Mock ({} chars of context)\n\nSENTIMENT: neutral\nTOPIC: general",
            last_user.chars().count()
        ))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
