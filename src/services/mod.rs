//! 基于 webhook 的三类服务：对话代理、AI 数据任务、语音转文字

pub mod ai_task;
pub mod conversation;
pub mod host;
pub mod stt;

pub use ai_task::{AiTaskRunner, GenDataTaskResult};
pub use conversation::{ConversationAgent, ConversationInput, ConversationResponse};
pub use host::{ConversationHost, DynConversationHost, ExposedEntity, NoHost, StaticHost};
pub use stt::{
    AudioCodec, AudioFormat, SpeechMetadata, SpeechResult, SpeechResultState, SpeechToText,
};
