use crate::config::{SubentryConfig, SubentryKind};
use crate::error::{HookFlowError, Result};

pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// 配置验证器
pub struct ConfigValidator;

impl ConfigValidator {
    /// 验证 webhook URL 格式
    pub fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(HookFlowError::Configuration(
                "webhook URL must not be empty".into(),
            ));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            tracing::error!(url = %url, "Invalid webhook URL");
            return Err(HookFlowError::Configuration(format!(
                "invalid webhook URL `{}`: must start with http:// or https://",
                url
            )));
        }

        Ok(())
    }

    /// 验证超时（秒）
    pub fn validate_timeout(timeout: u64) -> Result<()> {
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout) {
            return Err(HookFlowError::Configuration(format!(
                "timeout must be between {} and {} seconds, got {}",
                MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS, timeout
            )));
        }
        Ok(())
    }

    pub fn validate_output_field(field: &str) -> Result<()> {
        if field.trim().is_empty() {
            return Err(HookFlowError::Configuration(
                "output field must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// 验证语言代码
    ///
    /// 接受 `en`、`en-US`、`zh_CN`、`zh-Hant-TW` 这类形式：
    /// 首段 2~3 个字母，其余各段 2~8 个字母或数字。
    pub fn validate_language_code(code: &str) -> Result<()> {
        let code = code.trim();
        let invalid =
            || HookFlowError::Configuration(format!("invalid language code `{}`", code));

        if code.is_empty() {
            return Err(invalid());
        }

        let mut parts = code.split(['-', '_']);
        let primary = parts.next().unwrap_or_default();
        if !(2..=3).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(invalid());
        }

        for part in parts {
            if !(2..=8).contains(&part.len()) || !part.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid());
            }
        }

        Ok(())
    }

    /// 验证一个完整的子配置
    pub fn validate_subentry(config: &SubentryConfig) -> Result<()> {
        Self::validate_url(&config.webhook_url)?;
        Self::validate_timeout(config.timeout)?;
        Self::validate_output_field(&config.output_field)?;

        if config.kind == SubentryKind::Stt {
            if config.supported_languages.is_empty() {
                return Err(HookFlowError::Configuration(format!(
                    "subentry `{}` must specify at least one supported language",
                    config.name
                )));
            }
            for language in &config.supported_languages {
                Self::validate_language_code(language)?;
            }
        }

        if config.enable_streaming && config.streaming_end_value.is_empty() {
            return Err(HookFlowError::Configuration(
                "streaming end value must not be empty when streaming is enabled".into(),
            ));
        }

        Ok(())
    }
}
