use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::env::EnvConfig;
use crate::error::{HookFlowError, Result};
use crate::utils::validation::ConfigValidator;
use crate::webhook::auth::AuthConfig;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OUTPUT_FIELD: &str = "output";
pub const DEFAULT_STREAMING_END_VALUE: &str = "end";
pub const DEFAULT_PROMPT: &str = "You are a helpful voice assistant. Answer in plain sentences \
without markdown, keep replies short and suitable for being read aloud.";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubentryKind {
    Conversation,
    AiTask,
    Stt,
}

/// 一个 webhook 子配置的只读快照
///
/// 每次调用都拿到同一份 `Arc<SubentryConfig>`，调用过程中不会被修改。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SubentryConfig {
    pub kind: SubentryKind,
    pub name: String,
    pub webhook_url: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_output_field")]
    pub output_field: String,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    #[serde(default)]
    pub enable_streaming: bool,
    #[serde(default = "default_streaming_end_value")]
    pub streaming_end_value: String,
    #[serde(default = "default_enforce_terminators")]
    pub enforce_sentence_terminators: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_languages: Vec<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_output_field() -> String {
    DEFAULT_OUTPUT_FIELD.to_string()
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_streaming_end_value() -> String {
    DEFAULT_STREAMING_END_VALUE.to_string()
}

fn default_enforce_terminators() -> bool {
    true
}

impl SubentryConfig {
    pub fn new(kind: SubentryKind, name: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            webhook_url: webhook_url.into(),
            timeout: DEFAULT_TIMEOUT_SECS,
            auth: AuthConfig::default(),
            output_field: default_output_field(),
            prompt: default_prompt(),
            enable_streaming: false,
            streaming_end_value: default_streaming_end_value(),
            enforce_sentence_terminators: true,
            supported_languages: Vec::new(),
        }
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_field(mut self, field: impl Into<String>) -> Self {
        self.output_field = field.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_streaming(mut self, end_value: impl Into<String>) -> Self {
        self.enable_streaming = true;
        self.streaming_end_value = end_value.into();
        self
    }

    pub fn with_sentence_terminators(mut self, enforce: bool) -> Self {
        self.enforce_sentence_terminators = enforce;
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// 展开凭据里的环境变量引用并校验，得到可共享的快照
    pub fn resolve(mut self) -> Result<Arc<Self>> {
        self.auth.username = EnvConfig::expand_optional(self.auth.username.as_deref())?;
        self.auth.password = EnvConfig::expand_optional(self.auth.password.as_deref())?;
        ConfigValidator::validate_subentry(&self)?;
        Ok(Arc::new(self))
    }
}

/// 配置入口：一组命名的子配置
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub subentries: Vec<SubentryConfig>,
}

/// 已校验的配置入口
#[derive(Clone, Debug, Default)]
pub struct ResolvedEntry {
    subentries: HashMap<String, Arc<SubentryConfig>>,
}

impl WebhookEntry {
    pub fn from_json(content: &str) -> Result<ResolvedEntry> {
        let entry: WebhookEntry = serde_json::from_str(content)
            .map_err(|e| HookFlowError::Configuration(format!("invalid config: {}", e)))?;
        entry.resolve()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<ResolvedEntry> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            HookFlowError::Configuration(format!("failed to read `{}`: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn resolve(self) -> Result<ResolvedEntry> {
        let mut subentries = HashMap::new();
        for subentry in self.subentries {
            let name = subentry.name.clone();
            let resolved = subentry.resolve()?;
            if subentries.insert(name.clone(), resolved).is_some() {
                return Err(HookFlowError::Configuration(format!(
                    "duplicate subentry `{}`",
                    name
                )));
            }
        }
        Ok(ResolvedEntry { subentries })
    }
}

impl ResolvedEntry {
    pub fn get(&self, name: &str) -> Result<Arc<SubentryConfig>> {
        self.subentries
            .get(name)
            .cloned()
            .ok_or_else(|| HookFlowError::Configuration(format!("unknown subentry `{}`", name)))
    }

    /// 按类型过滤，名称有序
    pub fn of_kind(&self, kind: SubentryKind) -> Vec<Arc<SubentryConfig>> {
        let mut matching: Vec<_> = self
            .subentries
            .values()
            .filter(|config| config.kind == kind)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        matching
    }

    pub fn len(&self) -> usize {
        self.subentries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subentries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::auth::AuthType;

    #[test]
    fn test_defaults_applied() {
        let entry = WebhookEntry::from_json(
            r#"{"subentries": [
                {"kind": "conversation", "name": "assistant", "webhook_url": "http://localhost:5678/hook"}
            ]}"#,
        )
        .unwrap();

        let config = entry.get("assistant").unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.output_field, "output");
        assert_eq!(config.streaming_end_value, "end");
        assert!(!config.enable_streaming);
        assert!(config.enforce_sentence_terminators);
        assert_eq!(config.auth.auth_type, AuthType::None);
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let err = WebhookEntry::from_json(
            r#"{"subentries": [
                {"kind": "conversation", "name": "a", "webhook_url": "localhost/hook"}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, HookFlowError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_and_unknown_subentries() {
        let err = WebhookEntry::from_json(
            r#"{"subentries": [
                {"kind": "conversation", "name": "a", "webhook_url": "http://x"},
                {"kind": "ai_task", "name": "a", "webhook_url": "http://y"}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate subentry"));

        let entry = WebhookEntry::default().resolve().unwrap();
        assert!(entry.is_empty());
        assert!(entry.get("missing").is_err());
    }

    #[test]
    fn test_of_kind_sorted() {
        let entry = WebhookEntry {
            subentries: vec![
                SubentryConfig::new(SubentryKind::AiTask, "b", "http://b"),
                SubentryConfig::new(SubentryKind::Conversation, "c", "http://c"),
                SubentryConfig::new(SubentryKind::AiTask, "a", "http://a"),
            ],
        }
        .resolve()
        .unwrap();

        let names: Vec<_> = entry
            .of_kind(SubentryKind::AiTask)
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(entry.len(), 3);
    }
}
