//! 文件后端：每个用户一个 JSON 文件
//!
//! 写入走 临时文件 → fsync → rename，跨进程读者只会看到旧值或新值；
//! 不同用户写不同文件，互不覆盖。

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::backend::{decode_record, encode_record, RecordBackend};
use super::record::SessionRecord;
use crate::core::StoreError;

#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// 打开（必要时创建）存储目录
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// user_id 对应的文件路径；非 [A-Za-z0-9_-] 字符按 %XX 转义，避免不同 id 撞名
    pub fn record_path(&self, user_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", escape_user_id(user_id)))
    }
}

fn escape_user_id(user_id: &str) -> String {
    let mut out = String::with_capacity(user_id.len());
    for b in user_id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4()));
    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)?;
        #[cfg(unix)]
        if let Some(parent) = path.parent() {
            std::fs::File::open(parent)?.sync_all()?;
        }
        Ok(())
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

#[async_trait]
impl RecordBackend for FileBackend {
    async fn load(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let path = self.record_path(user_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode_record(user_id, &raw).map(Some)
    }

    async fn save(&self, user_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.record_path(user_id);
        let content = encode_record(record)?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &content))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))??;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_escape_keeps_ids_distinct() {
        assert_eq!(escape_user_id("user_123"), "user_123");
        assert_ne!(escape_user_id("a/b"), escape_user_id("a_b"));
        assert_eq!(escape_user_id("../x"), "%2E%2E%2Fx");
    }

    #[tokio::test]
    async fn test_save_then_load_from_fresh_handle() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        let mut record = SessionRecord::default();
        record.push_turn("I learned graphs today", "Nice");
        backend.save("u1", &record).await.unwrap();

        let reopened = FileBackend::open(dir.path()).await.unwrap();
        assert_eq!(reopened.load("u1").await.unwrap(), Some(record));
        assert!(reopened.load("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        backend.save("u1", &SessionRecord::default()).await.unwrap();
        backend.save("u1", &SessionRecord::default()).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["u1.json".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_not_treated_as_missing() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        std::fs::write(backend.record_path("u1"), "{\"tasks\": [oops").unwrap();

        let err = backend.load("u1").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
