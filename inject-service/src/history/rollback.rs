use crate::artifact::ArtifactStore;
use crate::error::{Result, ServiceError};
use crate::history::HistoryLedger;
use inject_domain::{HistoryAction, HistoryEntry, Snapshot, StreamKey};
use inject_infra::RateLimiter;
use std::sync::Arc;
use tracing::{info, warn};

/// 回滚结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackOutcome {
    pub stream: StreamKey,
    pub index: usize,
    pub content: String,
    pub char_count: usize,
    /// 记录这次回滚的新历史条目
    pub entry: HistoryEntry,
}

/// 回滚引擎
///
/// 索引0是当前状态，不能回滚；索引k恢复 `list()[k]` 的快照。
/// 恢复走可信写入路径，不经过内容校验，也不受限流约束；
/// 完成后追加一条回滚记录并清除该操作者在此流上的冷却。
pub struct RollbackEngine {
    artifacts: Arc<ArtifactStore>,
    ledger: Arc<HistoryLedger>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl RollbackEngine {
    pub fn new(
        artifacts: Arc<ArtifactStore>,
        ledger: Arc<HistoryLedger>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            artifacts,
            ledger,
            rate_limiter,
        }
    }

    pub async fn rollback(
        &self,
        actor_id: u64,
        actor_name: &str,
        stream: &StreamKey,
        index: usize,
    ) -> Result<RollbackOutcome> {
        if *stream == StreamKey::ActivityLog {
            return Err(ServiceError::InvalidStream(
                "the activity log cannot be rolled back".to_string(),
            ));
        }
        if index == 0 {
            return Err(ServiceError::CurrentState);
        }

        let snapshot = self
            .ledger
            .entry(stream, index)
            .await?
            .and_then(|entry| entry.snapshot)
            .ok_or_else(|| ServiceError::NotFound(format!("history entry {} of {}", index, stream)))?;

        let (action, restored) = match (stream, snapshot) {
            (StreamKey::Script(location), Snapshot::Script { content, conditions }) => {
                let script = self
                    .artifacts
                    .restore_inline_script(*location, content, conditions)
                    .await?;
                (
                    HistoryAction::Rollback,
                    Snapshot::Script {
                        content: script.content,
                        conditions: script.conditions,
                    },
                )
            }
            (StreamKey::Urls(location), Snapshot::Urls { urls }) => {
                let urls = self.artifacts.restore_linked_urls(*location, urls).await?;
                (HistoryAction::UrlRollback, Snapshot::Urls { urls })
            }
            (StreamKey::File(id), Snapshot::File { file, content }) if file.id == *id => {
                let file = self.artifacts.restore_managed_file(file, content.clone()).await?;
                (HistoryAction::FileRollback, Snapshot::File { file, content })
            }
            (stream, _) => {
                return Err(ServiceError::InvalidStream(format!(
                    "history entry {} does not belong to {}",
                    index, stream
                )))
            }
        };

        let entry = HistoryEntry::new(stream.clone(), action, actor_id, actor_name, restored.clone());
        self.ledger.append(entry.clone()).await?;

        if let Err(e) = self.rate_limiter.reset(actor_id, &stream.to_string()).await {
            warn!(stream = %stream, actor = actor_id, error = %e, "Failed to reset cooldown after rollback");
        }

        info!(stream = %stream, actor = actor_id, index, chars = entry.char_count, "Rolled back");
        Ok(RollbackOutcome {
            stream: stream.clone(),
            index,
            content: restored.text(),
            char_count: entry.char_count,
            entry,
        })
    }
}
