use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::config::{SubentryConfig, SubentryKind};
use crate::error::{HookFlowError, Result};
use crate::message::ConversationTurn;
use crate::webhook::extract::value_to_text;
use crate::webhook::{
    collect_content, GenDataTask, PayloadBuilder, ResponseExtractor, StreamFrameParser,
    WebhookClient,
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenDataTaskResult {
    pub conversation_id: String,
    pub data: Value,
}

/// 通过 webhook 执行 AI 生成数据任务
pub struct AiTaskRunner {
    config: Arc<SubentryConfig>,
    client: WebhookClient,
}

impl AiTaskRunner {
    pub fn new(config: Arc<SubentryConfig>) -> Result<Self> {
        if config.kind != SubentryKind::AiTask {
            return Err(HookFlowError::Configuration(format!(
                "subentry `{}` is not an ai_task subentry",
                config.name
            )));
        }
        let client = WebhookClient::from_config(&config)?;
        Ok(Self { config, client })
    }

    pub fn with_client(mut self, client: WebhookClient) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &SubentryConfig {
        &self.config
    }

    /// 执行任务
    ///
    /// 流式模式下拼接全部内容，不处理消息边界。
    /// 没有指定输出结构时结果总是文本，否则原样返回 webhook 的值。
    #[instrument(skip_all, fields(subentry = %self.config.name, task = %task.name))]
    pub async fn generate(
        &self,
        task: &GenDataTask,
        turn: &ConversationTurn,
    ) -> Result<GenDataTaskResult> {
        let payload = PayloadBuilder::new(self.config.enable_streaming)
            .task(turn, task)
            .await?;

        let reply = if self.config.enable_streaming {
            let parser = StreamFrameParser::new(self.config.streaming_end_value.clone());
            let events = self.client.call_streaming(&payload, parser).await?;
            Value::String(collect_content(events).await?)
        } else {
            let document = self.client.call(&payload).await?;
            ResponseExtractor::new(self.config.output_field.clone()).extract(document)?
        };

        let data = if task.structure.is_none() {
            Value::String(value_to_text(reply))
        } else {
            reply
        };

        Ok(GenDataTaskResult {
            conversation_id: turn.conversation_id.clone(),
            data,
        })
    }
}
