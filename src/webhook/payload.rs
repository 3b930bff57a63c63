use std::path::PathBuf;

use base64::{engine::general_purpose, Engine as _};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HookFlowError, Result};
use crate::message::{ConversationTurn, Message};

/// 可发送给 webhook 的请求体
///
/// `stream()` 必须和实际使用的传输方式一致，由客户端在发送前检查。
pub trait WebhookRequest: Serialize + Send + Sync {
    fn stream(&self) -> bool;
}

/// 对话类请求共有的字段
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConversationFields {
    pub messages: Vec<Message>,
    pub conversation_id: String,
    pub system_prompt: String,
    pub query: String,
    pub stream: bool,
}

/// 调用方附带的对话上下文，没有的字段以 `null` 发送
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatContext {
    pub agent_id: Option<String>,
    pub device_id: Option<String>,
    pub device_info: Option<Value>,
    /// 已暴露实体列表的 JSON 文本
    pub exposed_entities: Option<String>,
    pub language: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatPayload {
    #[serde(flatten)]
    pub base: ConversationFields,
    #[serde(flatten)]
    pub context: ChatContext,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskPayload {
    #[serde(flatten)]
    pub base: ConversationFields,
    pub task_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_objects: Option<Vec<BinaryAttachment>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SttPayload {
    pub audio: BinaryAttachment,
    pub language: String,
}

impl WebhookRequest for ChatPayload {
    fn stream(&self) -> bool {
        self.base.stream
    }
}

impl WebhookRequest for TaskPayload {
    fn stream(&self) -> bool {
        self.base.stream
    }
}

impl WebhookRequest for SttPayload {
    fn stream(&self) -> bool {
        false
    }
}

/// 内联到请求中的二进制对象，`data` 为 base64
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinaryAttachment {
    pub name: String,
    pub path: String,
    pub mime_type: String,
    pub data: String,
}

impl BinaryAttachment {
    pub fn from_bytes(
        name: impl Into<String>,
        path: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            mime_type: mime_type.into(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    /// 读取磁盘上的附件
    pub async fn read(attachment: &Attachment) -> Result<Self> {
        let bytes = tokio::fs::read(&attachment.path).await.map_err(|e| {
            HookFlowError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read attachment `{}`: {}", attachment.path.display(), e),
            ))
        })?;
        Ok(Self::from_bytes(
            attachment.media_content_id.clone(),
            attachment.path.to_string_lossy(),
            attachment.mime_type.clone(),
            &bytes,
        ))
    }
}

/// AI 任务的附件引用
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub media_content_id: String,
    pub path: PathBuf,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(
        media_content_id: impl Into<String>,
        path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            media_content_id: media_content_id.into(),
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// 生成数据任务
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GenDataTask {
    pub name: String,
    pub instructions: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// 期望输出结构的 JSON Schema
    #[serde(default)]
    pub structure: Option<Value>,
}

impl GenDataTask {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_structure(mut self, schema: Value) -> Self {
        self.structure = Some(schema);
        self
    }
}

/// 请求体构建器
#[derive(Clone, Copy, Debug)]
pub struct PayloadBuilder {
    streaming: bool,
}

impl PayloadBuilder {
    pub fn new(streaming: bool) -> Self {
        Self { streaming }
    }

    /// 首条为系统提示词，首尾之间为历史，`query` 由调用方给出
    pub fn conversation_fields(
        &self,
        turn: &ConversationTurn,
        query: impl Into<String>,
    ) -> Result<ConversationFields> {
        let system_prompt = turn.system_prompt()?.to_string();
        Ok(ConversationFields {
            messages: turn.history(),
            conversation_id: turn.conversation_id.clone(),
            system_prompt,
            query: query.into(),
            stream: self.streaming,
        })
    }

    /// 对话请求，`query` 取回合中最后一条用户消息
    pub fn chat(&self, turn: &ConversationTurn, context: ChatContext) -> Result<ChatPayload> {
        let base = self.conversation_fields(turn, "")?;
        let query = turn
            .last_user_message()
            .ok_or_else(|| HookFlowError::MalformedInput("no user message found in chat log".into()))?
            .to_string();
        Ok(ChatPayload {
            base: ConversationFields { query, ..base },
            context,
        })
    }

    /// AI 任务请求，`query` 为任务指令，附件并发读取
    pub async fn task(&self, turn: &ConversationTurn, task: &GenDataTask) -> Result<TaskPayload> {
        let base = self.conversation_fields(turn, task.instructions.clone())?;
        let binary_objects = if task.attachments.is_empty() {
            None
        } else {
            Some(read_attachments(&task.attachments).await?)
        };
        Ok(TaskPayload {
            base,
            task_name: task.name.clone(),
            structure: task.structure.clone(),
            binary_objects,
        })
    }
}

/// 并发读取全部附件，输出顺序与输入一致
pub async fn read_attachments(attachments: &[Attachment]) -> Result<Vec<BinaryAttachment>> {
    try_join_all(attachments.iter().map(BinaryAttachment::read)).await
}
