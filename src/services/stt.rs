use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, instrument, warn};

use crate::config::{SubentryConfig, SubentryKind};
use crate::error::{HookFlowError, Result};
use crate::webhook::{BinaryAttachment, SttPayload, WebhookClient};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Ogg,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// 按文件扩展名识别
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "ogg" => Some(AudioFormat::Ogg),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Pcm,
    Opus,
}

pub const SUPPORTED_FORMATS: &[AudioFormat] = &[AudioFormat::Wav, AudioFormat::Ogg];
pub const SUPPORTED_CODECS: &[AudioCodec] = &[AudioCodec::Pcm, AudioCodec::Opus];
pub const SUPPORTED_BIT_RATES: &[u32] = &[16];
pub const SUPPORTED_SAMPLE_RATES: &[u32] = &[16_000];
pub const SUPPORTED_CHANNELS: &[u16] = &[1];

/// 音频流的元数据
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpeechMetadata {
    pub language: String,
    pub format: AudioFormat,
    pub codec: AudioCodec,
    pub bit_rate: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

impl SpeechMetadata {
    /// 16 位、16 kHz 单声道
    pub fn new(language: impl Into<String>, format: AudioFormat, codec: AudioCodec) -> Self {
        Self {
            language: language.into(),
            format,
            codec,
            bit_rate: 16,
            sample_rate: 16_000,
            channels: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpeechResultState {
    Success,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpeechResult {
    pub text: Option<String>,
    pub result: SpeechResultState,
}

impl SpeechResult {
    pub fn success(text: Option<String>) -> Self {
        Self {
            text,
            result: SpeechResultState::Success,
        }
    }

    pub fn error() -> Self {
        Self {
            text: None,
            result: SpeechResultState::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == SpeechResultState::Success
    }
}

/// 通过 webhook 做语音转文字
///
/// 任何失败都记录日志并返回错误状态的结果，不向调用方抛出。
pub struct SpeechToText {
    config: Arc<SubentryConfig>,
    client: WebhookClient,
}

impl SpeechToText {
    pub fn new(config: Arc<SubentryConfig>) -> Result<Self> {
        if config.kind != SubentryKind::Stt {
            return Err(HookFlowError::Configuration(format!(
                "subentry `{}` is not an stt subentry",
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

    pub fn supported_languages(&self) -> &[String] {
        &self.config.supported_languages
    }

    pub fn supports(&self, metadata: &SpeechMetadata) -> bool {
        SUPPORTED_FORMATS.contains(&metadata.format)
            && SUPPORTED_CODECS.contains(&metadata.codec)
            && SUPPORTED_BIT_RATES.contains(&metadata.bit_rate)
            && SUPPORTED_SAMPLE_RATES.contains(&metadata.sample_rate)
            && SUPPORTED_CHANNELS.contains(&metadata.channels)
            && self
                .config
                .supported_languages
                .iter()
                .any(|lang| lang == &metadata.language)
    }

    /// 读完音频流后整体提交
    pub async fn process_audio<S>(&self, metadata: &SpeechMetadata, audio: S) -> SpeechResult
    where
        S: Stream<Item = Vec<u8>> + Send,
    {
        let audio: Vec<u8> = audio.concat().await;
        self.transcribe(metadata, &audio).await
    }

    #[instrument(skip(self, audio), fields(subentry = %self.config.name, bytes = audio.len()))]
    pub async fn transcribe(&self, metadata: &SpeechMetadata, audio: &[u8]) -> SpeechResult {
        if !self.supports(metadata) {
            warn!(language = %metadata.language, "Audio metadata outside advertised capabilities");
        }
        match self.request(metadata, audio).await {
            Ok(result) => result,
            Err(e) => {
                error!("Speech-to-text webhook failed: {}", e);
                SpeechResult::error()
            }
        }
    }

    async fn request(&self, metadata: &SpeechMetadata, audio: &[u8]) -> Result<SpeechResult> {
        let file_name = format!("audio.{}", metadata.format.as_str());
        let payload = SttPayload {
            audio: BinaryAttachment::from_bytes(
                file_name.clone(),
                file_name,
                format!("audio/{}", metadata.format.as_str()),
                audio,
            ),
            language: metadata.language.clone(),
        };

        let document = self.client.call(&payload).await?;
        match document.get(&self.config.output_field) {
            Some(Value::String(text)) if !text.is_empty() => {
                Ok(SpeechResult::success(Some(text.trim().to_string())))
            }
            Some(Value::String(_)) => Ok(SpeechResult::success(None)),
            _ => Err(HookFlowError::InvalidResponse(format!(
                "output field `{}` is missing or not a string",
                self.config.output_field
            ))),
        }
    }
}
