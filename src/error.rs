use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HookFlowError>;

#[derive(Debug, Error)]
pub enum HookFlowError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("error contacting webhook: HTTP {status} - {reason}")]
    Http { status: u16, reason: String },
    #[error("invalid webhook response: {0}")]
    InvalidResponse(String),
    #[error("webhook request timed out after {0:?}")]
    Timeout(Duration),
    #[error("webhook transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 错误分类
///
/// 调用方据此决定是否重试，本层不做任何重试。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    Configuration,
    Protocol,
    Transient,
}

impl HookFlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HookFlowError::MalformedInput(_) => ErrorKind::MalformedInput,
            HookFlowError::Configuration(_) => ErrorKind::Configuration,
            HookFlowError::Http { .. }
            | HookFlowError::InvalidResponse(_)
            | HookFlowError::Serialization(_)
            | HookFlowError::Other(_) => ErrorKind::Protocol,
            HookFlowError::Timeout(_) | HookFlowError::Transport(_) | HookFlowError::Io(_) => {
                ErrorKind::Transient
            }
        }
    }

    /// HTTP 状态码（仅 `Http` 错误有）
    pub fn status(&self) -> Option<u16> {
        match self {
            HookFlowError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            HookFlowError::Timeout(timeout)
        } else {
            HookFlowError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HookFlowError {
    fn from(err: serde_json::Error) -> Self {
        HookFlowError::Serialization(err.to_string())
    }
}
