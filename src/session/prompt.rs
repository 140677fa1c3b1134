//! 上下文组装与 Prompt 格式
//!
//! 从记录中取：画像、最近 N 条历史输入、最近 N 个任务描述、全部文档名，再加上用户消息。
//! 窗口只作用于读取，不改变存储。

use crate::memory::{Personality, SessionRecord};

/// 交给回复生成器的上下文
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBundle {
    pub personality: Personality,
    pub name: String,
    pub goal: String,
    pub education: String,
    pub recent_inputs: Vec<String>,
    pub recent_tasks: Vec<String>,
    pub document_names: Vec<String>,
    pub message: String,
    /// 本轮刚分配的任务（如有），让模型在回复里提到它
    pub new_task: Option<String>,
}

impl ContextBundle {
    pub fn from_record(
        record: &SessionRecord,
        message: &str,
        history_window: usize,
        task_window: usize,
    ) -> Self {
        let profile = record.profile.clone().unwrap_or_default();
        Self {
            personality: profile.personality,
            name: profile.name,
            goal: profile.goal,
            education: profile.education,
            recent_inputs: record
                .recent_history(history_window)
                .iter()
                .map(|h| h.input.clone())
                .collect(),
            recent_tasks: record
                .recent_tasks(task_window)
                .iter()
                .map(|t| t.description.clone())
                .collect(),
            document_names: record.documents.iter().map(|d| d.filename.clone()).collect(),
            message: message.to_string(),
            new_task: None,
        }
    }

    pub fn with_new_task(mut self, task: Option<String>) -> Self {
        self.new_task = task;
        self
    }

    /// 渲染为单个 Prompt；输出格式约定为 RESPONSE / SENTIMENT / TOPIC 三段
    pub fn render(&self) -> String {
        let mut prompt = format!(
            "You are an AI mentor with a {} personality.\n\n\
             ### User Profile\n\
             Name: {}\n\
             Goal: {}\n\
             Education: {}\n\n\
             ### Recent Messages\n{}\n\n\
             ### Tasks\n{}\n\n\
             ### Docs\n{}\n\n",
            self.personality.as_str(),
            self.name,
            self.goal,
            self.education,
            self.recent_inputs.join(", "),
            self.recent_tasks.join(", "),
            self.document_names.join(", "),
        );
        if let Some(task) = &self.new_task {
            prompt.push_str(&format!("### Newly Assigned Task\n{}\n\n", task));
        }
        prompt.push_str(&format!(
            "Respond in **markdown format**. Include:\n\
             - Response to user's message: \"{}\"\n\
             - Embedded follow-up relevant to their goals or past work\n\
             - Add a summary sentiment + topic\n\n\
             Format output as:\n\
             RESPONSE:\n<markdown>\n\n\
             SENTIMENT: <positive/neutral/negative>\n\
             TOPIC: <detected topic>\n",
            self.message
        ));
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Document, Profile, Task};

    fn record() -> SessionRecord {
        let mut record = SessionRecord::initialized(Profile {
            name: "Ada".into(),
            goal: "learn algorithms".into(),
            education: "BSc CS".into(),
            personality: Personality::Friendly,
            ..Profile::default()
        });
        for i in 0..5 {
            record.push_turn(format!("q{i}"), format!("a{i}"));
            record.tasks.push(Task::assigned(format!("t{i}")));
        }
        record.documents.push(Document {
            filename: "notes.txt".into(),
            content: "graphs".into(),
        });
        record
    }

    #[test]
    fn test_bundle_windows_last_three() {
        let bundle = ContextBundle::from_record(&record(), "hello", 3, 3);
        assert_eq!(bundle.recent_inputs, vec!["q2", "q3", "q4"]);
        assert_eq!(bundle.recent_tasks, vec!["t2", "t3", "t4"]);
        assert_eq!(bundle.document_names, vec!["notes.txt"]);
    }

    #[test]
    fn test_render_contains_sections() {
        let prompt = ContextBundle::from_record(&record(), "how do heaps work?", 3, 3)
            .with_new_task(Some("Implement a binary heap".into()))
            .render();
        assert!(prompt.contains("Friendly personality"));
        assert!(prompt.contains("Goal: learn algorithms"));
        assert!(prompt.contains("q2, q3, q4"));
        assert!(!prompt.contains("q1"));
        assert!(prompt.contains("Implement a binary heap"));
        assert!(prompt.contains("\"how do heaps work?\""));
        assert!(prompt.contains("SENTIMENT:"));
    }

    #[test]
    fn test_bundle_without_profile() {
        let bundle = ContextBundle::from_record(&SessionRecord::default(), "", 3, 3);
        assert_eq!(bundle.personality, Personality::Concise);
        assert!(bundle.recent_inputs.is_empty());
    }
}
