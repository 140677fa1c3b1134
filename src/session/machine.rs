//! 会话状态机
//!
//! 单次转移：每条消息恰好触发一次转移，除记录本身外不保留任何状态。
//!
//! | Action      | 记录变更                                   | 固定回复           |
//! |-------------|--------------------------------------------|--------------------|
//! | AssignTask  | 追加 {description, assigned}               | 说明新任务内容     |
//! | CheckTask   | 最后一个任务 assigned → done（空列表不变） | 确认完成           |
//! | LogLearning | 无                                         | 确认已记录学习     |
//! | Default     | 无                                         | 通用鼓励           |
//!
//! 之后追加一条历史 {input, response}。生成模式下，回复正文交给 ReplyGenerator；
//! 失败或超时使用兜底文案，历史照常追加。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::classifier::Action;
use super::generator::{generate_bounded, Analytics, ReplyGenerator};
use super::prompt::ContextBundle;
use crate::config::{default_fallback_reply, SessionSection};
use crate::memory::{Profile, SessionRecord, Task};

pub const CHECK_TASK_REPLY: &str = "Great job! Your latest task is marked as done.";
pub const LOG_LEARNING_REPLY: &str = "Nice work! I've logged what you learned.";
pub const DEFAULT_REPLY: &str = "Keep going! Every step brings you closer to your goal.";

const TASK_TEMPLATES: &[&str] = &[
    "Spend 30 focused minutes on one core concept for: {goal}",
    "Solve one practice problem that moves you toward: {goal}",
    "Write a short summary of what you already know about: {goal}",
    "Review your notes and list two open questions about: {goal}",
];

/// 状态机参数
#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub history_window: usize,
    pub task_window: usize,
    pub reply_timeout: Duration,
    pub reply_retries: u32,
    pub fallback_reply: String,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            history_window: 3,
            task_window: 3,
            reply_timeout: Duration::from_secs(30),
            reply_retries: 1,
            fallback_reply: default_fallback_reply(),
        }
    }
}

impl From<&SessionSection> for MachineConfig {
    fn from(s: &SessionSection) -> Self {
        Self {
            history_window: s.history_window,
            task_window: s.task_window,
            reply_timeout: s.reply_timeout(),
            reply_retries: s.reply_retries,
            fallback_reply: s.fallback_reply.clone(),
        }
    }
}

/// 一次转移的结果
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub action: Action,
    pub reply: String,
    pub analytics: Option<Analytics>,
    /// 本轮新分配的任务
    pub assigned_task: Option<Task>,
    /// 本轮是否真的把任务从 assigned 改为 done
    pub completed_task: bool,
    /// 是否使用了兜底回复
    pub fallback_used: bool,
}

/// 由画像与已有任务数确定下一条任务描述
pub fn plan_task(profile: Option<&Profile>, task_count: usize) -> String {
    let goal = profile
        .map(|p| p.goal.trim())
        .filter(|g| !g.is_empty())
        .unwrap_or("your goal");
    let template = TASK_TEMPLATES[task_count % TASK_TEMPLATES.len()];
    let mut task = template.replace("{goal}", goal);
    // 每轮第二个任务针对一个弱项
    if task_count % TASK_TEMPLATES.len() == 1 {
        if let Some(p) = profile.filter(|p| !p.weaknesses.is_empty()) {
            let weakness = &p.weaknesses[(task_count / TASK_TEMPLATES.len()) % p.weaknesses.len()];
            task.push_str(&format!(" (focus on your weak spot: {})", weakness));
        }
    }
    task
}

pub struct SessionMachine {
    generator: Option<Arc<dyn ReplyGenerator>>,
    config: MachineConfig,
}

impl SessionMachine {
    /// 只用固定转移表回复
    pub fn fixed(config: MachineConfig) -> Self {
        Self {
            generator: None,
            config,
        }
    }

    /// 回复正文交给生成器
    pub fn generated(generator: Arc<dyn ReplyGenerator>, config: MachineConfig) -> Self {
        Self {
            generator: Some(generator),
            config,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// 在工作副本上执行一次转移；永不失败
    pub async fn transition(
        &self,
        record: &mut SessionRecord,
        action: Action,
        message: &str,
    ) -> TurnOutcome {
        let mut assigned_task = None;
        let mut completed_task = false;

        // 上下文取自本轮变更之前的记录，新任务单独列出
        let bundle = if self.generator.is_some() {
            Some(ContextBundle::from_record(
                record,
                message,
                self.config.history_window,
                self.config.task_window,
            ))
        } else {
            None
        };

        let table_reply = match action {
            Action::AssignTask => {
                let task = Task::assigned(plan_task(record.profile.as_ref(), record.tasks.len()));
                let reply = format!("Your new task: {}", task.description);
                record.tasks.push(task.clone());
                assigned_task = Some(task);
                reply
            }
            Action::CheckTask => {
                // 空任务列表时不做任何修改
                if let Some(last) = record.last_task_mut() {
                    completed_task = last.complete();
                    record.last_check = Some(Utc::now());
                }
                CHECK_TASK_REPLY.to_string()
            }
            Action::LogLearning => LOG_LEARNING_REPLY.to_string(),
            Action::Default => DEFAULT_REPLY.to_string(),
        };
        tracing::debug!(
            action = action.as_str(),
            completed_task,
            assigned = assigned_task.is_some(),
            "Applied transition"
        );

        let (reply, analytics, fallback_used) = match (&self.generator, bundle) {
            (Some(generator), Some(bundle)) => {
                let prompt = bundle
                    .with_new_task(assigned_task.as_ref().map(|t| t.description.clone()))
                    .render();
                match generate_bounded(
                    generator.as_ref(),
                    &prompt,
                    self.config.reply_timeout,
                    self.config.reply_retries,
                )
                .await
                {
                    Ok(generated) => {
                        let analytics = generated.analytics();
                        (generated.text, Some(analytics), false)
                    }
                    Err(e) => {
                        tracing::warn!("Falling back to default reply: {}", e);
                        (self.config.fallback_reply.clone(), None, true)
                    }
                }
            }
            _ => (table_reply, None, false),
        };

        record.push_turn(message, reply.clone());

        TurnOutcome {
            action,
            reply,
            analytics,
            assigned_task,
            completed_task,
            fallback_used,
        }
    }
}
