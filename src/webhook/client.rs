use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use once_cell::sync::Lazy;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::instrument;

use super::payload::WebhookRequest;
use super::stream::{EventStream, StreamFrameParser};
use crate::config::SubentryConfig;
use crate::error::{HookFlowError, Result};
use crate::utils::validation::ConfigValidator;

/// 进程内共享的 HTTP 客户端，复用连接池
static SHARED_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_default()
});

/// webhook HTTP 客户端
///
/// 超时覆盖整个调用，包括连接和读取完整响应体；流式调用时同样约束逐行读取。
/// 状态码不是 200 时直接失败，不会产生任何事件。
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(
        url: impl Into<String>,
        headers: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        let url = url.into();
        ConfigValidator::validate_url(&url)?;
        Ok(Self {
            client: SHARED_CLIENT.clone(),
            url,
            headers,
            timeout,
        })
    }

    pub fn from_config(config: &SubentryConfig) -> Result<Self> {
        Self::new(
            config.webhook_url.clone(),
            config.auth.headers(),
            config.timeout_duration(),
        )
    }

    /// 使用自定义的 reqwest 客户端
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 非流式调用，返回完整的 JSON 响应
    #[instrument(skip(self, payload), fields(url = %self.url))]
    pub async fn call<P: WebhookRequest>(&self, payload: &P) -> Result<Value> {
        let response = self.send(payload, false).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| HookFlowError::from_transport(e, self.timeout))?;
        let document: Value = serde_json::from_slice(&bytes).map_err(|e| {
            HookFlowError::InvalidResponse(format!(
                "response is not JSON ({}): {}",
                e,
                String::from_utf8_lossy(&bytes)
            ))
        })?;
        tracing::debug!(response = %document, "Webhook response");
        Ok(document)
    }

    /// 流式调用，返回惰性的事件流
    ///
    /// 丢弃返回的流即释放连接。
    #[instrument(skip(self, payload, parser), fields(url = %self.url))]
    pub async fn call_streaming<P: WebhookRequest>(
        &self,
        payload: &P,
        parser: StreamFrameParser,
    ) -> Result<EventStream> {
        let response = self.send(payload, true).await?;
        let timeout = self.timeout;
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| HookFlowError::from_transport(e, timeout)));
        Ok(parser.frames(body))
    }

    /// 两种调用共用的请求构建和状态码检查
    async fn send<P: WebhookRequest>(&self, payload: &P, streaming: bool) -> Result<reqwest::Response> {
        if payload.stream() != streaming {
            return Err(HookFlowError::MalformedInput(format!(
                "payload stream flag is {} but the call is {}",
                payload.stream(),
                if streaming { "streaming" } else { "non-streaming" }
            )));
        }

        let body = serde_json::to_vec(payload)?;
        tracing::debug!(
            streaming,
            payload = %String::from_utf8_lossy(&body),
            "Webhook request"
        );

        let mut request = self.client.post(&self.url).timeout(self.timeout);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| HookFlowError::from_transport(e, self.timeout))?;

        let status = response.status();
        if status != StatusCode::OK {
            let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
            tracing::debug!(status = status.as_u16(), reason = %reason, "Webhook rejected request");
            return Err(HookFlowError::Http {
                status: status.as_u16(),
                reason,
            });
        }

        Ok(response)
    }
}
