//! 核心编排层：错误分类与会话编排器

pub mod error;
pub mod orchestrator;

pub use error::{ExtractError, GeneratorError, MentorError, StoreError};
pub use orchestrator::{DocumentOutcome, ReplyEnvelope, SessionOrchestrator, Upload, UploadReceipt};
