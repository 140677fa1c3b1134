//! 会话层：动作识别、上下文组装、回复生成适配器、单次转移状态机

pub mod classifier;
pub mod generator;
pub mod machine;
pub mod prompt;

pub use classifier::{classify, Action};
pub use generator::{
    generate_bounded, parse_reply, Analytics, GeneratedReply, LlmReplyGenerator, ReplyGenerator,
    Sentiment,
};
pub use machine::{plan_task, MachineConfig, SessionMachine, TurnOutcome};
pub use prompt::ContextBundle;
