use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::host::DynConversationHost;
use crate::config::{SubentryConfig, SubentryKind};
use crate::error::{HookFlowError, Result};
use crate::message::ConversationTurn;
use crate::webhook::{
    AssistantDelta, ChatContext, DeltaReconstructor, DeltaStream, PayloadBuilder,
    ResponseExtractor, StreamFrameParser, WebhookClient,
};

/// 本轮对话的调用方信息
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationInput {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

pub enum ConversationResponse {
    Complete(String),
    Streaming(DeltaStream),
}

impl ConversationResponse {
    /// 取完整文本，流式响应会被读完
    pub async fn into_text(self) -> Result<String> {
        match self {
            ConversationResponse::Complete(text) => Ok(text),
            ConversationResponse::Streaming(mut deltas) => {
                let mut text = String::new();
                while let Some(delta) = deltas.next().await {
                    if let AssistantDelta::Content(content) = delta? {
                        text.push_str(&content);
                    }
                }
                Ok(text)
            }
        }
    }
}

/// webhook 对话代理
pub struct ConversationAgent {
    config: Arc<SubentryConfig>,
    client: WebhookClient,
    host: DynConversationHost,
}

impl ConversationAgent {
    pub fn new(config: Arc<SubentryConfig>, host: DynConversationHost) -> Result<Self> {
        if config.kind != SubentryKind::Conversation {
            return Err(HookFlowError::Configuration(format!(
                "subentry `{}` is not a conversation subentry",
                config.name
            )));
        }
        let client = WebhookClient::from_config(&config)?;
        Ok(Self {
            config,
            client,
            host,
        })
    }

    pub fn with_client(mut self, client: WebhookClient) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &SubentryConfig {
        &self.config
    }

    /// 配置的系统提示词，宿主用它生成回合的首条消息
    pub fn system_prompt(&self) -> &str {
        &self.config.prompt
    }

    async fn chat_context(&self, input: &ConversationInput) -> Result<ChatContext> {
        let device_info = match &input.device_id {
            Some(device_id) => self.host.device_info(device_id).await,
            None => None,
        };
        let exposed_entities = serde_json::to_string(&self.host.exposed_entities().await)?;

        Ok(ChatContext {
            agent_id: input.agent_id.clone(),
            device_id: input.device_id.clone(),
            device_info,
            exposed_entities: Some(exposed_entities),
            language: input.language.clone(),
            user_id: input.user_id.clone(),
        })
    }

    /// 把本轮对话发送给 webhook
    ///
    /// 开启流式时返回增量流，否则返回输出字段的文本。
    #[instrument(skip_all, fields(subentry = %self.config.name, conversation_id = %turn.conversation_id))]
    pub async fn respond(
        &self,
        input: &ConversationInput,
        turn: &ConversationTurn,
    ) -> Result<ConversationResponse> {
        turn.system_prompt()?;
        let context = self.chat_context(input).await?;
        let payload = PayloadBuilder::new(self.config.enable_streaming).chat(turn, context)?;

        if self.config.enable_streaming {
            let parser = StreamFrameParser::new(self.config.streaming_end_value.clone());
            let events = self.client.call_streaming(&payload, parser).await?;
            let deltas = DeltaReconstructor::new(self.config.enforce_sentence_terminators)
                .reconstruct(events);
            Ok(ConversationResponse::Streaming(deltas))
        } else {
            let document = self.client.call(&payload).await?;
            let reply = ResponseExtractor::new(self.config.output_field.clone())
                .extract_text(document)?;
            Ok(ConversationResponse::Complete(reply))
        }
    }
}
