//! 会话编排器：每条入站消息调用一次 handle
//!
//! 加载 → 识别 → 转移（可能调用回复生成器）→ 持久化 → 返回回复。
//! 整个序列持有该用户的锁，同一用户的并发请求按某个串行顺序生效，其他用户不受影响。
//! 附带的文档在同一事务内追加，不存在额外的非原子窗口。

use std::sync::Arc;

use serde::Serialize;

use crate::config::{AppConfig, ReplyMode};
use crate::core::{ExtractError, MentorError, StoreError};
use crate::documents::{snippet, BasicExtractor, DocumentExtractor};
use crate::llm::create_llm_from_config;
use crate::memory::{create_backend, Document, MemoryStore, Profile, ProfilePatch, SessionRecord};
use crate::session::{classify, Action, Analytics, LlmReplyGenerator, MachineConfig, SessionMachine};

/// 上传的文件
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// 随聊天附带的文档处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Stored { filename: String, chars: usize },
    /// 提取失败的文档不入库
    Rejected { filename: String, reason: String },
}

/// handle 的返回
#[derive(Debug, Clone, Serialize)]
pub struct ReplyEnvelope {
    pub reply: String,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<Analytics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentOutcome>,
}

/// 单独上传的回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub message: String,
    pub content_snippet: String,
}

pub struct SessionOrchestrator {
    store: MemoryStore,
    machine: SessionMachine,
    extractor: Arc<dyn DocumentExtractor>,
    snippet_chars: usize,
}

fn validate_user_id(user_id: &str) -> Result<(), MentorError> {
    if user_id.trim().is_empty() {
        return Err(MentorError::InvalidUserId(user_id.to_string()));
    }
    Ok(())
}

impl SessionOrchestrator {
    pub fn new(
        store: MemoryStore,
        machine: SessionMachine,
        extractor: Arc<dyn DocumentExtractor>,
    ) -> Self {
        Self {
            store,
            machine,
            extractor,
            snippet_chars: 300,
        }
    }

    pub fn with_snippet_chars(mut self, n: usize) -> Self {
        self.snippet_chars = n;
        self
    }

    /// 按配置组装：存储后端、回复模式（固定 / 生成）、内置文档提取器
    pub async fn from_config(cfg: &AppConfig) -> Result<Self, StoreError> {
        let store = MemoryStore::new(create_backend(&cfg.store).await?);
        let machine_cfg = MachineConfig::from(&cfg.session);
        let machine = match cfg.session.reply_mode {
            ReplyMode::Fixed => SessionMachine::fixed(machine_cfg),
            ReplyMode::Generated => {
                let llm = create_llm_from_config(&cfg.llm);
                SessionMachine::generated(Arc::new(LlmReplyGenerator::new(llm)), machine_cfg)
            }
        };
        tracing::info!(
            "Session orchestrator ready (store: {}, reply mode: {:?})",
            store.backend_name(),
            cfg.session.reply_mode
        );
        Ok(Self::new(store, machine, Arc::new(BasicExtractor))
            .with_snippet_chars(cfg.documents.snippet_chars))
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// 唯一的创建路径：写入初始记录（已存在则重置）
    pub async fn setup(&self, user_id: &str, profile: Profile) -> Result<SessionRecord, MentorError> {
        validate_user_id(user_id)?;
        let record = self.store.initialize(user_id, profile).await?;
        tracing::info!("User '{}' set up", user_id);
        Ok(record)
    }

    /// 部分更新画像
    pub async fn update_profile(
        &self,
        user_id: &str,
        patch: ProfilePatch,
    ) -> Result<Profile, MentorError> {
        validate_user_id(user_id)?;
        let mut txn = self.store.begin(user_id).await?;
        if !txn.existed() {
            return Err(MentorError::NotInitialized(user_id.to_string()));
        }
        txn.record_mut()
            .profile
            .get_or_insert_with(Profile::default)
            .apply(patch);
        let record = txn.commit().await?;
        Ok(record.profile.unwrap_or_default())
    }

    /// 读取记录；未 setup 的用户得到空默认记录
    pub async fn get(&self, user_id: &str) -> Result<SessionRecord, MentorError> {
        validate_user_id(user_id)?;
        Ok(self.store.get(user_id).await?)
    }

    /// 单独上传文档；不支持的格式直接报错且不入库
    pub async fn upload(&self, user_id: &str, upload: Upload) -> Result<UploadReceipt, MentorError> {
        validate_user_id(user_id)?;
        let filename = upload.filename.clone();
        let content = self.extract(upload).await?;

        let mut txn = self.store.begin(user_id).await?;
        if !txn.existed() {
            return Err(MentorError::NotInitialized(user_id.to_string()));
        }
        txn.record_mut().documents.push(Document {
            filename: filename.clone(),
            content: content.clone(),
        });
        txn.commit().await?;

        tracing::info!("Stored document '{}' for user '{}'", filename, user_id);
        Ok(UploadReceipt {
            message: format!("Uploaded and parsed {}", filename),
            content_snippet: snippet(&content, self.snippet_chars),
        })
    }

    /// 处理一轮对话
    pub async fn handle(
        &self,
        user_id: &str,
        message: &str,
        upload: Option<Upload>,
    ) -> Result<ReplyEnvelope, MentorError> {
        validate_user_id(user_id)?;

        // 提取在加锁之前完成，不占用该用户的锁
        let extracted = match upload {
            Some(upload) => {
                let filename = upload.filename.clone();
                Some((filename, self.extract(upload).await))
            }
            None => None,
        };

        let mut txn = self.store.begin(user_id).await?;
        if !txn.existed() {
            return Err(MentorError::NotInitialized(user_id.to_string()));
        }

        let document = extracted.map(|(filename, result)| match result {
            Ok(content) => {
                let chars = content.chars().count();
                txn.record_mut().documents.push(Document {
                    filename: filename.clone(),
                    content,
                });
                DocumentOutcome::Stored { filename, chars }
            }
            Err(e) => {
                tracing::warn!("Skipping document '{}' for user '{}': {}", filename, user_id, e);
                DocumentOutcome::Rejected {
                    filename,
                    reason: e.to_string(),
                }
            }
        });

        let action = classify(message);
        tracing::debug!(user_id, action = action.as_str(), "Classified message");

        let outcome = self.machine.transition(txn.record_mut(), action, message).await;
        txn.commit().await.inspect_err(|e| {
            tracing::error!("Failed to persist turn for user '{}': {}", user_id, e);
        })?;

        Ok(ReplyEnvelope {
            reply: outcome.reply,
            action: outcome.action,
            analytics: outcome.analytics,
            document,
        })
    }

    async fn extract(&self, upload: Upload) -> Result<String, ExtractError> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&upload.filename, &upload.bytes))
            .await
            .map_err(|e| ExtractError::Malformed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBackend, TaskStatus};

    fn orchestrator() -> SessionOrchestrator {
        SessionOrchestrator::new(
            MemoryStore::new(Arc::new(MemoryBackend::new())),
            SessionMachine::fixed(MachineConfig::default()),
            Arc::new(BasicExtractor),
        )
    }

    fn profile() -> Profile {
        Profile {
            name: "Ada".into(),
            goal: "learn algorithms".into(),
            ..Profile::default()
        }
    }

    #[tokio::test]
    async fn test_handle_requires_setup() {
        let o = orchestrator();
        let err = o.handle("u1", "hello", None).await.unwrap_err();
        assert!(matches!(err, MentorError::NotInitialized(_)));
        assert!(!o.store().exists("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_blank_user_id_rejected() {
        let o = orchestrator();
        assert!(matches!(
            o.setup("  ", profile()).await,
            Err(MentorError::InvalidUserId(_))
        ));
    }

    #[tokio::test]
    async fn test_chat_with_document_is_one_write() {
        let o = orchestrator();
        o.setup("u1", profile()).await.unwrap();
        let env = o
            .handle("u1", "done", Some(Upload::new("notes.md", "BFS uses a queue")))
            .await
            .unwrap();
        assert_eq!(env.action, Action::CheckTask);
        assert_eq!(
            env.document,
            Some(DocumentOutcome::Stored {
                filename: "notes.md".into(),
                chars: 16
            })
        );
        let record = o.get("u1").await.unwrap();
        assert_eq!(record.documents.len(), 1);
        assert_eq!(record.history.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_document_in_chat_is_skipped() {
        let o = orchestrator();
        o.setup("u1", profile()).await.unwrap();
        let env = o
            .handle("u1", "what next?", Some(Upload::new("cv.pdf", vec![1u8, 2, 3])))
            .await
            .unwrap();
        assert!(matches!(env.document, Some(DocumentOutcome::Rejected { .. })));
        let record = o.get("u1").await.unwrap();
        assert!(record.documents.is_empty());
        assert_eq!(record.tasks.len(), 1);
        assert_eq!(record.tasks[0].status, TaskStatus::Assigned);
    }

    #[tokio::test]
    async fn test_standalone_upload() {
        let o = orchestrator();
        o.setup("u1", profile()).await.unwrap();
        let receipt = o
            .upload("u1", Upload::new("a.txt", "x".repeat(500)))
            .await
            .unwrap();
        assert_eq!(receipt.message, "Uploaded and parsed a.txt");
        assert_eq!(receipt.content_snippet.len(), 300);

        let err = o.upload("u1", Upload::new("a.exe", "MZ")).await.unwrap_err();
        assert!(matches!(err, MentorError::Extract(ExtractError::UnsupportedFormat(_))));
        assert_eq!(o.get("u1").await.unwrap().documents.len(), 1);
    }

    #[tokio::test]
    async fn test_update_profile_merges() {
        let o = orchestrator();
        assert!(matches!(
            o.update_profile("u1", ProfilePatch::default()).await,
            Err(MentorError::NotInitialized(_))
        ));
        o.setup("u1", profile()).await.unwrap();
        let updated = o
            .update_profile(
                "u1",
                ProfilePatch {
                    education: Some("BTech CSE".into()),
                    ..ProfilePatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.education, "BTech CSE");
    }

    #[tokio::test]
    async fn test_setup_resets_existing_user() {
        let o = orchestrator();
        o.setup("u1", profile()).await.unwrap();
        o.handle("u1", "give me work", None).await.unwrap();
        o.setup("u1", profile()).await.unwrap();
        let record = o.get("u1").await.unwrap();
        assert!(record.tasks.is_empty());
        assert!(record.history.is_empty());
    }
}
