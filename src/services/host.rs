use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 暴露给对话代理的实体
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExposedEntity {
    pub entity_id: String,
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub area_name: Option<String>,
}

/// 宿主平台提供的只读信息
///
/// 设备注册表和实体暴露规则都属于宿主，这里只约定接口。
#[async_trait]
pub trait ConversationHost: Send + Sync {
    async fn device_info(&self, device_id: &str) -> Option<Value>;
    async fn exposed_entities(&self) -> Vec<ExposedEntity>;
}

pub type DynConversationHost = Arc<dyn ConversationHost>;

/// 没有设备、也不暴露任何实体的宿主
#[derive(Clone, Debug, Default)]
pub struct NoHost;

#[async_trait]
impl ConversationHost for NoHost {
    async fn device_info(&self, _device_id: &str) -> Option<Value> {
        None
    }

    async fn exposed_entities(&self) -> Vec<ExposedEntity> {
        Vec::new()
    }
}

/// 内容固定的宿主，用于命令行和测试
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StaticHost {
    #[serde(default)]
    pub devices: HashMap<String, Value>,
    #[serde(default)]
    pub entities: Vec<ExposedEntity>,
}

impl StaticHost {
    pub fn with_device(mut self, device_id: impl Into<String>, info: Value) -> Self {
        self.devices.insert(device_id.into(), info);
        self
    }

    pub fn with_entity(mut self, entity: ExposedEntity) -> Self {
        self.entities.push(entity);
        self
    }
}

#[async_trait]
impl ConversationHost for StaticHost {
    async fn device_info(&self, device_id: &str) -> Option<Value> {
        self.devices.get(device_id).cloned()
    }

    async fn exposed_entities(&self) -> Vec<ExposedEntity> {
        self.entities.clone()
    }
}
