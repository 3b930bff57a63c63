use std::collections::HashMap;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    None,
    Basic,
}

/// webhook 认证配置
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    #[serde(rename = "type", default)]
    pub auth_type: AuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl AuthConfig {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Basic,
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// 根据认证方式生成请求头
    ///
    /// basic 认证缺少用户名或密码时只记录警告，不带 Authorization 头继续请求。
    pub fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(CONTENT_TYPE.to_string(), "application/json".to_string());

        if self.auth_type == AuthType::Basic {
            let username = self.username.as_deref().unwrap_or_default();
            let password = self.password.as_deref().unwrap_or_default();

            if !username.is_empty() && !password.is_empty() {
                let credentials =
                    general_purpose::STANDARD.encode(format!("{}:{}", username, password));
                headers.insert(AUTHORIZATION.to_string(), format!("Basic {}", credentials));
            } else {
                tracing::warn!("Basic authentication configured but credentials missing");
            }
        }

        headers
    }
}
