//! Mentor - 导师会话后端核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与会话编排器（加载 → 识别 → 转移 → 持久化）
//! - **documents**: 文档提取协作方边界
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Groq / Mock）
//! - **memory**: 会话记录模型、按用户锁与持久化后端
//! - **session**: 动作识别、上下文组装、回复生成适配器与状态机

pub mod config;
pub mod core;
pub mod documents;
pub mod llm;
pub mod memory;
pub mod session;

pub use crate::core::{MentorError, ReplyEnvelope, SessionOrchestrator, Upload};
