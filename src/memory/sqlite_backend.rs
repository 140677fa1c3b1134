//! SQLite 后端：每个用户一行，记录以 JSON 文本存放
//!
//! rusqlite 是同步接口，所有操作放进 spawn_blocking；单条 UPSERT 由 SQLite 保证原子性。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::backend::{decode_record, encode_record, RecordBackend};
use super::record::SessionRecord;
use crate::core::StoreError;

const SCHEMA: &str = r#"
PRAGMA journal_mode=WAL;
PRAGMA synchronous=FULL;
CREATE TABLE IF NOT EXISTS session_records (
    user_id TEXT PRIMARY KEY,
    record TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))??;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("sqlite connection poisoned".into()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

#[async_trait]
impl RecordBackend for SqliteBackend {
    async fn load(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let key = user_id.to_string();
        let raw = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT record FROM session_records WHERE user_id = ?1",
                        params![key],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?)
            })
            .await?;
        raw.map(|raw| decode_record(user_id, &raw)).transpose()
    }

    async fn save(&self, user_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let key = user_id.to_string();
        let content = encode_record(record)?;
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO session_records(user_id, record, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id) DO UPDATE SET
                  record=excluded.record,
                  updated_at=excluded.updated_at
                "#,
                params![key, content, chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::record::Task;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upsert_replaces_whole_record() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let mut record = SessionRecord::default();
        record.tasks.push(Task::assigned("solve two-sum"));
        backend.save("u1", &record).await.unwrap();

        record.tasks[0].complete();
        backend.save("u1", &record).await.unwrap();

        let loaded = backend.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mentor.db");
        {
            let backend = SqliteBackend::open(&path).await.unwrap();
            let mut record = SessionRecord::default();
            record.push_turn("hello", "hi");
            backend.save("u1", &record).await.unwrap();
        }
        let backend = SqliteBackend::open(&path).await.unwrap();
        let loaded = backend.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.history.len(), 1);
        assert!(backend.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_row_surfaces_as_corrupt() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO session_records(user_id, record, updated_at) VALUES ('u1', 'nope', '')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        assert!(matches!(
            backend.load("u1").await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
