use async_trait::async_trait;
use crate::cache::Cache;
use chrono::Utc;
use std::sync::Arc;

/// 冷却窗口的占用结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// 已占用窗口，可以写入
    Granted,
    /// 仍在冷却中
    Limited { retry_after: u64 },
}

/// 速率限制器trait
///
/// 以 (操作者, 流) 为键的冷却窗口。不同操作者、不同流互不影响。
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// 检查是否仍在冷却期内，返回剩余秒数
    async fn is_limited(&self, actor_id: u64, stream: &str)
        -> Result<Option<u64>, Box<dyn std::error::Error + Send + Sync>>;

    /// 记录一次写入（开始冷却）
    async fn record_write(&self, actor_id: u64, stream: &str)
        -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// 原子地检查并开始冷却
    async fn try_acquire(&self, actor_id: u64, stream: &str)
        -> Result<Acquire, Box<dyn std::error::Error + Send + Sync>>;

    /// 清除冷却
    async fn reset(&self, actor_id: u64, stream: &str)
        -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// 基于缓存TTL的冷却限流器
///
/// 缓存值为开始冷却的时间戳（秒），用于计算剩余时间。
pub struct CooldownRateLimiter {
    cache: Arc<dyn Cache>,
    prefix: String,
    cooldown_seconds: u64,
}

impl CooldownRateLimiter {
    pub fn new(cache: Arc<dyn Cache>, cooldown_seconds: u64) -> Self {
        Self {
            cache,
            prefix: "inject_cooldown:".to_string(),
            cooldown_seconds,
        }
    }

    pub fn cooldown_seconds(&self) -> u64 {
        self.cooldown_seconds
    }

    fn cooldown_key(&self, actor_id: u64, stream: &str) -> String {
        format!("{}{}:{}", self.prefix, actor_id, stream)
    }

    fn remaining(&self, started_at: Option<String>) -> u64 {
        let now = Utc::now().timestamp();
        let started_at = started_at
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(now);
        let elapsed = now.saturating_sub(started_at).max(0) as u64;
        self.cooldown_seconds.saturating_sub(elapsed).max(1)
    }
}

#[async_trait]
impl RateLimiter for CooldownRateLimiter {
    async fn is_limited(&self, actor_id: u64, stream: &str)
        -> Result<Option<u64>, Box<dyn std::error::Error + Send + Sync>> {
        if self.cooldown_seconds == 0 {
            return Ok(None);
        }
        let key = self.cooldown_key(actor_id, stream);
        match self.cache.get(&key).await? {
            Some(started_at) => Ok(Some(self.remaining(Some(started_at)))),
            None => Ok(None),
        }
    }

    async fn record_write(&self, actor_id: u64, stream: &str)
        -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.cooldown_seconds == 0 {
            return Ok(());
        }
        let key = self.cooldown_key(actor_id, stream);
        let now = Utc::now().timestamp().to_string();
        self.cache.set(&key, &now, Some(self.cooldown_seconds)).await
    }

    async fn try_acquire(&self, actor_id: u64, stream: &str)
        -> Result<Acquire, Box<dyn std::error::Error + Send + Sync>> {
        if self.cooldown_seconds == 0 {
            return Ok(Acquire::Granted);
        }
        let key = self.cooldown_key(actor_id, stream);
        let now = Utc::now().timestamp().to_string();
        if self.cache.set_if_absent(&key, &now, Some(self.cooldown_seconds)).await? {
            return Ok(Acquire::Granted);
        }
        let started_at = self.cache.get(&key).await?;
        Ok(Acquire::Limited {
            retry_after: self.remaining(started_at),
        })
    }

    async fn reset(&self, actor_id: u64, stream: &str)
        -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let key = self.cooldown_key(actor_id, stream);
        self.cache.delete(&key).await
    }
}
