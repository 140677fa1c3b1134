//! 记录存储后端抽象
//!
//! 只负责整条记录的读取与原子替换；并发控制在 MemoryStore（按用户锁）中完成。
//! 支持内存、每用户一个 JSON 文件、SQLite 三种实现。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::file_backend::FileBackend;
use super::record::SessionRecord;
use super::sqlite_backend::SqliteBackend;
use crate::config::{StoreBackendKind, StoreSection};
use crate::core::StoreError;

/// 物理存储接口
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// 读取记录；不存在时返回 None（不是错误）
    async fn load(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// 整条替换；返回成功前必须已持久化，且任何读者都看不到半写状态
    async fn save(&self, user_id: &str, record: &SessionRecord) -> Result<(), StoreError>;

    /// 后端名称（日志用）
    fn name(&self) -> &'static str;
}

/// 内存后端（测试与临时运行）
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    async fn load(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn save(&self, user_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(user_id.to_string(), record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// 根据配置创建存储后端
pub async fn create_backend(cfg: &StoreSection) -> Result<Arc<dyn RecordBackend>, StoreError> {
    let backend: Arc<dyn RecordBackend> = match cfg.backend {
        StoreBackendKind::Memory => Arc::new(MemoryBackend::new()),
        StoreBackendKind::File => Arc::new(FileBackend::open(&cfg.path).await?),
        StoreBackendKind::Sqlite => Arc::new(SqliteBackend::open(&cfg.path).await?),
    };
    tracing::info!("Using {} record backend at {:?}", backend.name(), cfg.path);
    Ok(backend)
}

/// 解析 JSON 记录；失败一律视为损坏（不得当作空记录）
pub(crate) fn decode_record(user_id: &str, raw: &str) -> Result<SessionRecord, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        user_id: user_id.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn encode_record(record: &SessionRecord) -> Result<String, StoreError> {
    serde_json::to_string_pretty(record).map_err(|e| StoreError::Unavailable(e.to_string()))
}
