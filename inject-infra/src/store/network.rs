use async_trait::async_trait;
use inject_api::store::{OptionStore, StoreError};
use serde_json::Value;
use std::sync::Arc;

/// 多站点分层选项存储
///
/// 读取时先查站点，站点没有值时使用网络级默认值；写入和删除只作用于站点。
pub struct NetworkOptionStore {
    site: Arc<dyn OptionStore>,
    network: Arc<dyn OptionStore>,
}

impl NetworkOptionStore {
    pub fn new(site: Arc<dyn OptionStore>, network: Arc<dyn OptionStore>) -> Self {
        Self { site, network }
    }
}

#[async_trait]
impl OptionStore for NetworkOptionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.site.get(key).await? {
            Some(value) => Ok(Some(value)),
            None => self.network.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.site.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.site.delete(key).await
    }
}
