//! 回复生成适配器
//!
//! 外部语言模型的边界：输入一个 Prompt，输出正文与可选的情绪/话题分析。
//! 调用方通过 `generate_bounded` 施加总超时与重试；生成器本身无副作用，重试无需去重。

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::GeneratorError;
use crate::llm::{LlmClient, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

/// 随回复返回的分析信息；不写入会话记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    pub sentiment: Sentiment,
    pub topic: String,
}

/// 生成结果
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReply {
    pub text: String,
    pub sentiment: Option<Sentiment>,
    pub topic: Option<String>,
}

impl GeneratedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sentiment: None,
            topic: None,
        }
    }

    /// 缺省情绪为 neutral、话题为 general
    pub fn analytics(&self) -> Analytics {
        Analytics {
            sentiment: self.sentiment.unwrap_or(Sentiment::Neutral),
            topic: self.topic.clone().unwrap_or_else(|| "general".to_string()),
        }
    }
}

/// 回复生成器接口
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedReply, GeneratorError>;
}

/// 基于 LlmClient 的生成器：单条 user 消息，解析 RESPONSE / SENTIMENT / TOPIC
pub struct LlmReplyGenerator {
    llm: Arc<dyn LlmClient>,
}

impl LlmReplyGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ReplyGenerator for LlmReplyGenerator {
    async fn generate(&self, prompt: &str) -> Result<GeneratedReply, GeneratorError> {
        let started = Instant::now();
        let result = self.llm.complete(&[Message::user(prompt)]).await;
        let elapsed = started.elapsed();
        match result {
            Ok(raw) => {
                let (prompt_tokens, completion_tokens, _) = self.llm.token_usage();
                tracing::info!(
                    model = self.llm.model_name(),
                    prompt_chars = prompt.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    prompt_tokens,
                    completion_tokens,
                    "Model invocation succeeded"
                );
                parse_reply(&raw).ok_or(GeneratorError::Empty)
            }
            Err(e) => {
                tracing::warn!(
                    model = self.llm.model_name(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Model invocation failed: {}",
                    e
                );
                Err(GeneratorError::Failure(e))
            }
        }
    }
}

static TRAILER_RE: OnceLock<Regex> = OnceLock::new();
static RESPONSE_RE: OnceLock<Regex> = OnceLock::new();
static SENTIMENT_RE: OnceLock<Regex> = OnceLock::new();
static TOPIC_RE: OnceLock<Regex> = OnceLock::new();

/// 输出末尾连续的 SENTIMENT / TOPIC 行（允许夹空行）的起始位置；没有则为 raw.len()
fn trailer_start(raw: &str, marker: &Regex) -> usize {
    let mut offsets = Vec::new();
    let mut pos = 0;
    for line in raw.split_inclusive('\n') {
        offsets.push((pos, line));
        pos += line.len();
    }

    let mut start = raw.len();
    for &(pos, line) in offsets.iter().rev() {
        if line.trim().is_empty() {
            continue;
        }
        if !marker.is_match(line) {
            break;
        }
        start = pos;
    }
    start
}

/// 解析模型输出；正文为空时返回 None
///
/// 只有开头的 `RESPONSE:` 视为标题，只有结尾的 SENTIMENT / TOPIC 块视为分析字段，
/// 正文中间出现的同名词原样保留。
pub fn parse_reply(raw: &str) -> Option<GeneratedReply> {
    let trailer = TRAILER_RE
        .get_or_init(|| Regex::new(r"(?i)^[\s*_#]*(?:SENTIMENT|TOPIC)[*_\s]*:").unwrap());
    let response =
        RESPONSE_RE.get_or_init(|| Regex::new(r"(?i)^\s*[*_#]*\s*RESPONSE[*_]*\s*:[*_]*").unwrap());
    let sentiment_re = SENTIMENT_RE
        .get_or_init(|| Regex::new(r"(?im)^[\s*_#]*SENTIMENT[*_\s]*:[*_\s]*([a-z]+)").unwrap());
    let topic_re = TOPIC_RE
        .get_or_init(|| Regex::new(r"(?im)^[\s*_#]*TOPIC[*_\s]*:[*_\s]*(.+?)[*_\s]*$").unwrap());

    let body_end = trailer_start(raw, trailer);
    let body = &raw[..body_end];
    let body = response
        .find(body)
        .map(|m| &body[m.end()..])
        .unwrap_or(body)
        .trim();
    if body.is_empty() {
        return None;
    }

    let tail = &raw[body_end..];
    let sentiment = sentiment_re
        .captures(tail)
        .and_then(|c| Sentiment::parse(&c[1]));
    let topic = topic_re
        .captures(tail)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty());

    Some(GeneratedReply {
        text: body.to_string(),
        sentiment,
        topic,
    })
}

/// 在总超时内调用生成器，失败时最多再试 `retries` 次
pub async fn generate_bounded(
    generator: &dyn ReplyGenerator,
    prompt: &str,
    timeout: Duration,
    retries: u32,
) -> Result<GeneratedReply, GeneratorError> {
    let attempts = async {
        let mut last_err = GeneratorError::Empty;
        for attempt in 0..=retries {
            match generator.generate(prompt).await {
                Ok(reply) if !reply.text.trim().is_empty() => return Ok(reply),
                Ok(_) => last_err = GeneratorError::Empty,
                Err(e) => {
                    tracing::debug!("Reply generation attempt {} failed: {}", attempt + 1, e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    };
    match tokio::time::timeout(timeout, attempts).await {
        Ok(result) => result,
        Err(_) => Err(GeneratorError::Timeout(timeout)),
    }
}
