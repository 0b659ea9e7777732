use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use redis::Client as RedisClient;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache trait 定义带过期时间的缓存操作
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;
    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// 键不存在时写入，返回是否写入成功
    ///
    /// 检查与写入是一个原子操作，两个并发调用者最多只有一个得到true。
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    async fn delete(&self, key: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// RedisCache 使用Redis实现的缓存
pub struct RedisCache {
    client: Arc<RedisClient>,
}

impl RedisCache {
    pub fn new(client: Arc<RedisClient>) -> Self {
        Self { client }
    }

    pub fn open(url: &str) -> Result<Self, redis::RedisError> {
        Ok(Self::new(Arc::new(RedisClient::open(url)?)))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl.filter(|t| *t > 0) {
            cmd.arg("EX").arg(ttl);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl.filter(|t| *t > 0) {
            cmd.arg("EX").arg(ttl);
        }
        // NX未写入时返回nil
        let result: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(result.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CachedValue {
    value: String,
    ttl: Option<Duration>,
}

/// 每个条目使用自己的过期时间
struct PerEntryExpiry;

impl Expiry<String, CachedValue> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &CachedValue, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// MemoryCache 使用进程内moka缓存实现
pub struct MemoryCache {
    inner: MokaCache<String, CachedValue>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryExpiry)
            .build();
        Self { inner }
    }

    fn entry(value: &str, ttl: Option<u64>) -> CachedValue {
        CachedValue {
            value: value.to_string(),
            ttl: ttl.map(Duration::from_secs),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.inner.get(key).await.map(|cached| cached.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.inner.insert(key.to_string(), Self::entry(value, ttl)).await;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let cached = Self::entry(value, ttl);
        let entry = self
            .inner
            .entry(key.to_string())
            .or_insert_with(async move { cached })
            .await;
        Ok(entry.is_fresh())
    }

    async fn delete(&self, key: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_trait_object_safety() {
        fn takes_cache(_cache: &dyn Cache) {}
        takes_cache(&MemoryCache::default());
    }

    #[tokio::test]
    async fn test_memory_cache_set_get_delete() {
        let cache = MemoryCache::default();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_set_if_absent_only_once() {
        let cache = MemoryCache::default();
        assert!(cache.set_if_absent("lock", "1", Some(60)).await.unwrap());
        assert!(!cache.set_if_absent("lock", "2", Some(60)).await.unwrap());
        assert_eq!(cache.get("lock").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_memory_cache_entry_expires() {
        let cache = MemoryCache::default();
        cache.set("short", "v", Some(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(cache.get("short").await.unwrap(), None);
        assert!(cache.set_if_absent("short", "again", Some(1)).await.unwrap());
    }
}
