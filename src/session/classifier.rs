//! 动作识别
//!
//! 纯函数、确定、全域：任意输入（含空串）恰好映射到一个 Action，永不失败。
//! 规则按顺序匹配（大小写不敏感的子串），先命中者生效：
//! 1. 空白消息 → Default
//! 2. 含 "done" → CheckTask
//! 3. 含 "today" 或 "learned" → LogLearning
//! 4. 其余 → AssignTask

use serde::{Deserialize, Serialize};

/// 识别出的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// 分配新任务
    AssignTask,
    /// 完成最近的任务
    CheckTask,
    /// 记录学习心得
    LogLearning,
    /// 通用鼓励
    Default,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::AssignTask,
        Action::CheckTask,
        Action::LogLearning,
        Action::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::AssignTask => "assign_task",
            Action::CheckTask => "check_task",
            Action::LogLearning => "log_learning",
            Action::Default => "default",
        }
    }
}

const CHECK_KEYWORDS: &[&str] = &["done"];
const LEARNING_KEYWORDS: &[&str] = &["today", "learned"];

/// 识别最新一条用户消息对应的动作
pub fn classify(message: &str) -> Action {
    if message.trim().is_empty() {
        return Action::Default;
    }

    let lower = message.to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if contains_any(CHECK_KEYWORDS) {
        Action::CheckTask
    } else if contains_any(LEARNING_KEYWORDS) {
        Action::LogLearning
    } else {
        Action::AssignTask
    }
}
