use crate::error::{HookFlowError, Result};
use std::env;

/// 环境变量配置管理
pub struct EnvConfig;

impl EnvConfig {
    /// 展开 `${VAR_NAME}` 形式的引用
    ///
    /// 其他值原样返回，便于在配置文件里避免写明文密码。
    pub fn expand(value: &str) -> Result<String> {
        if value.starts_with("${") && value.ends_with('}') && value.len() > 3 {
            let env_var_name = &value[2..value.len() - 1];
            Self::get_env(env_var_name)
        } else {
            Ok(value.to_string())
        }
    }

    pub fn expand_optional(value: Option<&str>) -> Result<Option<String>> {
        value.map(Self::expand).transpose()
    }

    /// 从环境变量获取值
    pub fn get_env(key: &str) -> Result<String> {
        env::var(key).map_err(|_| {
            HookFlowError::Configuration(format!("environment variable `{}` is not set", key))
        })
    }

    pub fn is_debug_mode() -> bool {
        env::var("HOOKFLOW_DEBUG").is_ok()
    }
}
