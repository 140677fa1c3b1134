//! 会话记录：每个用户一条，是存储与变更的最小单位
//!
//! 画像（profile）、任务（tasks）、历史（history）、文档（documents）与 last_check。
//! 任务与历史只追加；唯一允许的原地修改是最后一个任务的 assigned → done。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 导师沟通风格
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Personality {
    #[default]
    Concise,
    Professional,
    Friendly,
    Challenger,
    Cheerful,
    Empathetic,
}

impl Personality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Concise => "Concise",
            Personality::Professional => "Professional",
            Personality::Friendly => "Friendly",
            Personality::Challenger => "Challenger",
            Personality::Cheerful => "Cheerful",
            Personality::Empathetic => "Empathetic",
        }
    }
}

fn default_mentor_type() -> String {
    "Tech Mentor".to_string()
}

/// 用户画像：已知字段有类型，未知字段原样透传（extra）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default = "default_mentor_type")]
    pub mentor_type: String,
    #[serde(default)]
    pub personality: Personality,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            education: String::new(),
            goal: String::new(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            mentor_type: default_mentor_type(),
            personality: Personality::default(),
            extra: BTreeMap::new(),
        }
    }
}

/// 画像的部分更新；None / 空值表示不修改
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub education: Option<String>,
    pub goal: Option<String>,
    pub strengths: Option<Vec<String>>,
    pub weaknesses: Option<Vec<String>>,
    pub mentor_type: Option<String>,
    pub personality: Option<Personality>,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Profile {
    /// 合并补丁中的非空字段
    pub fn apply(&mut self, patch: ProfilePatch) {
        fn set(slot: &mut String, value: Option<String>) {
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                *slot = v;
            }
        }
        set(&mut self.name, patch.name);
        set(&mut self.education, patch.education);
        set(&mut self.goal, patch.goal);
        set(&mut self.mentor_type, patch.mentor_type);
        if let Some(s) = patch.strengths {
            self.strengths = s;
        }
        if let Some(w) = patch.weaknesses {
            self.weaknesses = w;
        }
        if let Some(p) = patch.personality {
            self.personality = p;
        }
        self.extra.extend(patch.extra);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Assigned,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub description: String,
    pub status: TaskStatus,
}

impl Task {
    pub fn assigned(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            status: TaskStatus::Assigned,
        }
    }

    /// assigned → done；已完成则不变（单调），返回是否发生了迁移
    pub fn complete(&mut self) -> bool {
        match self.status {
            TaskStatus::Assigned => {
                self.status = TaskStatus::Done;
                true
            }
            TaskStatus::Done => false,
        }
    }
}

/// 一轮对话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub input: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub content: String,
}

/// 单个用户的会话记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// setup 时的初始记录：画像已填，其余为空
    pub fn initialized(profile: Profile) -> Self {
        Self {
            profile: Some(profile),
            ..Self::default()
        }
    }

    pub fn push_turn(&mut self, input: impl Into<String>, response: impl Into<String>) {
        self.history.push(HistoryEntry {
            input: input.into(),
            response: response.into(),
            timestamp: Utc::now(),
        });
    }

    /// 最近 n 条历史（读侧窗口，不影响存储）
    pub fn recent_history(&self, n: usize) -> &[HistoryEntry] {
        &self.history[self.history.len().saturating_sub(n)..]
    }

    pub fn recent_tasks(&self, n: usize) -> &[Task] {
        &self.tasks[self.tasks.len().saturating_sub(n)..]
    }

    pub fn last_task_mut(&mut self) -> Option<&mut Task> {
        self.tasks.last_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_is_empty() {
        let record = SessionRecord::default();
        assert!(record.profile.is_none());
        assert!(record.tasks.is_empty());
        assert!(record.history.is_empty());
        assert!(record.documents.is_empty());
    }

    #[test]
    fn test_task_completion_is_monotonic() {
        let mut task = Task::assigned("read chapter 1");
        assert!(task.complete());
        assert_eq!(task.status, TaskStatus::Done);
        assert!(!task.complete());
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[test]
    fn test_recent_windows() {
        let mut record = SessionRecord::default();
        for i in 0..5 {
            record.push_turn(format!("in {i}"), format!("out {i}"));
        }
        let recent: Vec<_> = record.recent_history(3).iter().map(|h| h.input.as_str()).collect();
        assert_eq!(recent, vec!["in 2", "in 3", "in 4"]);
        assert_eq!(record.recent_tasks(3).len(), 0);
        assert_eq!(record.history.len(), 5);
    }

    #[test]
    fn test_unknown_profile_attributes_pass_through() {
        let json = r#"{"name":"Ada","goal":"learn algorithms","timezone":"UTC+1"}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.mentor_type, "Tech Mentor");
        assert_eq!(profile.personality, Personality::Concise);
        assert_eq!(profile.extra.get("timezone").unwrap(), "UTC+1");

        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back["timezone"], "UTC+1");
    }

    #[test]
    fn test_profile_patch_skips_empty_values() {
        let mut profile = Profile {
            name: "Ada".into(),
            goal: "learn algorithms".into(),
            ..Profile::default()
        };
        profile.apply(ProfilePatch {
            name: Some("  ".into()),
            goal: Some("get a job".into()),
            personality: Some(Personality::Friendly),
            ..ProfilePatch::default()
        });
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.goal, "get a job");
        assert_eq!(profile.personality, Personality::Friendly);
    }

    #[test]
    fn test_legacy_record_without_ids_or_timestamps_fields() {
        let json = r#"{"tasks":[{"description":"x","status":"assigned"}],"history":[],"documents":[]}"#;
        let record: SessionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.tasks.len(), 1);
        assert_eq!(record.tasks[0].status, TaskStatus::Assigned);
        assert!(record.profile.is_none());
    }
}
