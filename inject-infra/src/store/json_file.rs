use async_trait::async_trait;
use inject_api::store::{OptionStore, StoreError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// JSON文件选项存储
///
/// 整个选项表保存在一个JSON文件中。每次写入都先写临时文件再改名，
/// 写入失败时内存中的值回退到写入前的状态。
pub struct JsonFileOptionStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileOptionStore {
    /// 打开存储文件，不存在时从空表开始
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = data.len(), "Option store opened");
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    /// 修改并持久化；持久化失败时恢复原值
    async fn apply(&self, key: &str, value: Option<Value>) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        let previous = match value {
            Some(value) => data.insert(key.to_string(), value),
            None => data.remove(key),
        };
        if let Err(e) = self.persist(&data).await {
            match previous {
                Some(previous) => data.insert(key.to_string(), previous),
                None => data.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl OptionStore for JsonFileOptionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.apply(key, Some(value)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.apply(key, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");

        let store = JsonFileOptionStore::open(&path).await.unwrap();
        store.set("inject_head_script", json!({"content": "a()"})).await.unwrap();
        store.set("temp", json!(1)).await.unwrap();
        store.delete("temp").await.unwrap();
        drop(store);

        let reopened = JsonFileOptionStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("inject_head_script").await.unwrap(),
            Some(json!({"content": "a()"}))
        );
        assert!(reopened.get("temp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, b"{broken").unwrap();

        assert!(matches!(
            JsonFileOptionStore::open(&path).await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        // 目标路径是目录，改名必然失败
        let path = dir.path().join("occupied");
        std::fs::create_dir_all(path.join("child")).unwrap();

        let store = JsonFileOptionStore {
            path: path.clone(),
            data: Mutex::new(BTreeMap::new()),
        };
        assert!(store.set("k", json!("v")).await.is_err());
        assert!(store.get("k").await.unwrap().is_none());
    }
}
