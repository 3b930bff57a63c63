use serde_json::Value;

use crate::error::{HookFlowError, Result};

/// 从非流式响应中取出配置的输出字段
#[derive(Clone, Debug)]
pub struct ResponseExtractor {
    output_field: String,
}

impl ResponseExtractor {
    pub fn new(output_field: impl Into<String>) -> Self {
        Self {
            output_field: output_field.into(),
        }
    }

    /// 响应必须是对象且包含输出字段；字段值为空字符串也算成功
    pub fn extract(&self, document: Value) -> Result<Value> {
        let Value::Object(mut fields) = document else {
            return Err(HookFlowError::InvalidResponse(document.to_string()));
        };

        match fields.remove(&self.output_field) {
            Some(value) => Ok(value),
            None => Err(HookFlowError::InvalidResponse(format!(
                "missing output field `{}` in {}",
                self.output_field,
                Value::Object(fields)
            ))),
        }
    }

    /// 取出字段并转为文本，非字符串值按 JSON 文本返回
    pub fn extract_text(&self, document: Value) -> Result<String> {
        Ok(value_to_text(self.extract(document)?))
    }
}

pub fn value_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
