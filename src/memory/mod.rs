//! 记忆层：会话记录模型、按用户锁、存储门面与物理后端（内存 / JSON 文件 / SQLite）

pub mod backend;
pub mod file_backend;
pub mod locks;
pub mod record;
pub mod sqlite_backend;
pub mod store;

pub use backend::{create_backend, MemoryBackend, RecordBackend};
pub use file_backend::FileBackend;
pub use locks::KeyLocks;
pub use record::{
    Document, HistoryEntry, Personality, Profile, ProfilePatch, SessionRecord, Task, TaskStatus,
};
pub use sqlite_backend::SqliteBackend;
pub use store::{MemoryStore, RecordTxn};
