pub mod json_file;
pub mod network;

pub use json_file::JsonFileOptionStore;
pub use network::NetworkOptionStore;

use async_trait::async_trait;
use inject_api::store::{OptionStore, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// 进程内选项存储（测试和临时实例使用）
#[derive(Default)]
pub struct MemoryOptionStore {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OptionStore for MemoryOptionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.data.write().await.remove(key);
        Ok(())
    }
}
