//! webhook 协议桥接
//!
//! 核心组件：
//! - `PayloadBuilder`: 把对话回合整理成请求体
//! - `AuthConfig`: 根据认证配置生成请求头
//! - `WebhookClient`: 发送 POST，支持一次性响应和 NDJSON 流式响应
//! - `StreamFrameParser`: 把响应体逐行解析为事件
//! - `DeltaReconstructor`: 把事件还原为助手增量，并在消息边界补句末符
//! - `ResponseExtractor`: 从非流式响应中取出输出字段

pub mod auth;
pub mod client;
pub mod delta;
pub mod extract;
pub mod payload;
pub mod stream;

pub use auth::{AuthConfig, AuthType};
pub use client::WebhookClient;
pub use delta::{collect_content, AssistantDelta, DeltaReconstructor, DeltaStream};
pub use extract::ResponseExtractor;
pub use payload::{
    Attachment, BinaryAttachment, ChatContext, ChatPayload, ConversationFields, GenDataTask,
    PayloadBuilder, SttPayload, TaskPayload, WebhookRequest,
};
pub use stream::{EventStream, StreamEvent, StreamFrameParser};
