//! 错误类型
//!
//! 按层划分：存储（StoreError）、回复生成（GeneratorError）、文档提取（ExtractError），
//! 以及编排器对外暴露的 MentorError。生成错误不会传给调用方，由兜底回复吸收。

use std::time::Duration;

use thiserror::Error;

/// 记忆存储错误；“未找到”不是错误，get 返回空默认记录
#[derive(Error, Debug)]
pub enum StoreError {
    /// 底层介质不可读/不可写（可由调用方整体重试）
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// update 只修改已存在的记录；创建必须走 initialize
    #[error("No record for user '{0}'")]
    Missing(String),

    /// 反序列化失败，需要人工介入，不能当作空记录处理
    #[error("Corrupt record for user '{user_id}': {reason}")]
    Corrupt { user_id: String, reason: String },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// 回复生成错误：只在状态机内部出现，由兜底回复吸收
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Reply generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reply generator failed: {0}")]
    Failure(String),

    #[error("Reply generator returned no usable text")]
    Empty,
}

/// 文档提取错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// 编排器对外错误
#[derive(Error, Debug)]
pub enum MentorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    /// 会话记录只能由 setup 显式创建
    #[error("User '{0}' has not been set up")]
    NotInitialized(String),
}

impl MentorError {
    /// 是否可以整体重试该请求（仅存储介质不可用时）
    pub fn is_retryable(&self) -> bool {
        matches!(self, MentorError::Store(StoreError::Unavailable(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_only_for_unavailable() {
        let err = MentorError::from(StoreError::Unavailable("disk gone".into()));
        assert!(err.is_retryable());

        let err = MentorError::from(StoreError::Corrupt {
            user_id: "u1".into(),
            reason: "bad json".into(),
        });
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("u1"));

        let err = MentorError::from(ExtractError::UnsupportedFormat("exe".into()));
        assert!(!err.is_retryable());
    }
}
