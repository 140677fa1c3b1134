//! 记忆存储：user_id → SessionRecord
//!
//! 在后端之上提供按用户线性一致的 get / put / update，以及跨越异步调用（如回复生成）
//! 持有同一把用户锁的事务 `RecordTxn`。不同用户之间不做任何串行化。

use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;

use super::backend::RecordBackend;
use super::locks::KeyLocks;
use super::record::{Profile, SessionRecord};
use crate::core::StoreError;

/// 存储门面
#[derive(Clone)]
pub struct MemoryStore {
    backend: Arc<dyn RecordBackend>,
    locks: Arc<KeyLocks>,
}

impl MemoryStore {
    pub fn new(backend: Arc<dyn RecordBackend>) -> Self {
        Self {
            backend,
            locks: Arc::new(KeyLocks::new()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// 读取记录；不存在时返回空默认记录
    pub async fn get(&self, user_id: &str) -> Result<SessionRecord, StoreError> {
        Ok(self.backend.load(user_id).await?.unwrap_or_default())
    }

    /// 是否已经 setup 过（持久化记录存在）
    pub async fn exists(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.backend.load(user_id).await?.is_some())
    }

    /// 整条替换；不检查记录是否已存在，是 initialize 的写入路径
    pub async fn put(&self, user_id: &str, record: SessionRecord) -> Result<(), StoreError> {
        let _guard = self.locks.acquire(user_id).await;
        self.backend.save(user_id, &record).await
    }

    /// 显式创建：画像填好，任务/历史/文档为空；已存在则重置（与 setup 语义一致）
    pub async fn initialize(
        &self,
        user_id: &str,
        profile: Profile,
    ) -> Result<SessionRecord, StoreError> {
        let record = SessionRecord::initialized(profile);
        self.put(user_id, record.clone()).await?;
        Ok(record)
    }

    /// 原子 读-改-写；返回写回后的记录。只作用于已存在的记录，不会隐式创建
    pub async fn update<F>(&self, user_id: &str, mutator: F) -> Result<SessionRecord, StoreError>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let mut txn = self.begin(user_id).await?;
        if !txn.existed() {
            return Err(StoreError::Missing(user_id.to_string()));
        }
        mutator(txn.record_mut());
        txn.commit().await
    }

    /// 开启一个用户级事务：持锁加载记录，直到 commit 或 drop 才释放
    pub async fn begin(&self, user_id: &str) -> Result<RecordTxn, StoreError> {
        let guard = self.locks.acquire(user_id).await;
        let loaded = self.backend.load(user_id).await?;
        Ok(RecordTxn {
            user_id: user_id.to_string(),
            existed: loaded.is_some(),
            record: loaded.unwrap_or_default(),
            backend: Arc::clone(&self.backend),
            _guard: guard,
        })
    }
}

/// 持有用户锁的工作副本；drop 而不 commit 等于放弃修改
pub struct RecordTxn {
    user_id: String,
    existed: bool,
    record: SessionRecord,
    backend: Arc<dyn RecordBackend>,
    _guard: OwnedMutexGuard<()>,
}

impl RecordTxn {
    /// 开启事务时记录是否已持久化
    pub fn existed(&self) -> bool {
        self.existed
    }

    pub fn record_mut(&mut self) -> &mut SessionRecord {
        &mut self.record
    }

    /// 写回并释放锁
    pub async fn commit(self) -> Result<SessionRecord, StoreError> {
        self.backend.save(&self.user_id, &self.record).await?;
        Ok(self.record)
    }
}
