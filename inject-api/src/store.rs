use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// 选项存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// 持久化键值存储（选项表）
///
/// 单个键的写入是原子的，这是同一键上多个写入者之间唯一的并发控制。
/// 值以JSON形式保存，类型化的序列化只发生在这条边界上。
#[async_trait]
pub trait OptionStore: Send + Sync {
    /// 读取键值，不存在时返回None
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// 写入键值（整体替换）
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// 删除键
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

impl dyn OptionStore {
    /// 读取并反序列化为类型化记录
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// 读取类型化记录，不存在时返回默认值
    pub async fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StoreError> {
        Ok(self.load(key).await?.unwrap_or_default())
    }

    /// 序列化并写入类型化记录
    pub async fn save<T: Serialize + Sync + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        self.set(key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapStore(Mutex<HashMap<String, Value>>);

    #[async_trait]
    impl OptionStore for MapStore {
        async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
            self.0.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_typed_load_and_save() {
        let store: Box<dyn OptionStore> = Box::new(MapStore(Mutex::new(HashMap::new())));

        let missing: Option<Vec<String>> = store.load("urls").await.unwrap();
        assert!(missing.is_none());

        store.save("urls", &vec!["a".to_string(), "b".to_string()]).await.unwrap();
        let loaded: Vec<String> = store.load_or_default("urls").await.unwrap();
        assert_eq!(loaded, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_load_wrong_shape_is_serialization_error() {
        let store: Box<dyn OptionStore> = Box::new(MapStore(Mutex::new(HashMap::new())));
        store.set("count", Value::String("not a number".into())).await.unwrap();

        let result: Result<Option<u64>, _> = store.load("count").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
