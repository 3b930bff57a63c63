use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HookFlowError, Result};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// 发送给 webhook 的单条历史消息
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// 宿主对话日志中的原始内容
///
/// 各类内容的字段不一致：助手内容可能为空，工具结果是任意 JSON。
/// 通过 [`ChatContent::to_message`] 归一化为 [`Message`]。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatContent {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
    },
    #[serde(rename = "tool")]
    ToolResult {
        #[serde(default)]
        tool_result: Option<Value>,
    },
}

impl ChatContent {
    pub fn role(&self) -> MessageRole {
        match self {
            ChatContent::System { .. } => MessageRole::System,
            ChatContent::User { .. } => MessageRole::User,
            ChatContent::Assistant { .. } => MessageRole::Assistant,
            ChatContent::ToolResult { .. } => MessageRole::Tool,
        }
    }

    /// 文本内容，空内容统一为 `""`，工具结果转成字符串
    pub fn text(&self) -> String {
        match self {
            ChatContent::System { content } | ChatContent::User { content } => content.clone(),
            ChatContent::Assistant { content } => content.clone().unwrap_or_default(),
            ChatContent::ToolResult { tool_result } => match tool_result {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
            },
        }
    }

    pub fn to_message(&self) -> Message {
        Message::new(self.role(), self.text())
    }
}

/// 一次调用的对话回合
///
/// 第一条必须是系统消息，最后一条是本轮用户输入。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub conversation_id: String,
    pub content: Vec<ChatContent>,
}

impl ConversationTurn {
    pub fn new(conversation_id: impl Into<String>, content: Vec<ChatContent>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content,
        }
    }

    /// 校验回合结构，返回系统提示词
    pub fn system_prompt(&self) -> Result<&str> {
        if self.content.len() < 2 {
            return Err(HookFlowError::MalformedInput(format!(
                "conversation turn needs at least 2 messages, got {}",
                self.content.len()
            )));
        }
        match &self.content[0] {
            ChatContent::System { content } => Ok(content),
            _ => Err(HookFlowError::MalformedInput(
                "first message must be a system message".into(),
            )),
        }
    }

    /// 去掉首尾之后的历史消息，保持原顺序
    pub fn history(&self) -> Vec<Message> {
        if self.content.len() < 2 {
            return Vec::new();
        }
        self.content[1..self.content.len() - 1]
            .iter()
            .map(ChatContent::to_message)
            .collect()
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.content.iter().rev().find_map(|content| match content {
            ChatContent::User { content } => Some(content.as_str()),
            _ => None,
        })
    }
}
