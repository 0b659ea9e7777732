use crate::error::Result;
use inject_api::OptionStore;
use inject_domain::{HistoryEntry, Limits, StreamKey};
use std::sync::Arc;
use tracing::debug;

/// 将记录插入队首并截断到上限
///
/// `dedup` 为true时，与队首内容相同的记录不插入。返回是否插入。
pub fn push_bounded(entries: &mut Vec<HistoryEntry>, entry: HistoryEntry, bound: usize, dedup: bool) -> bool {
    if dedup {
        if let Some(head) = entries.first() {
            if entry.duplicates(head) {
                return false;
            }
        }
    }
    entries.insert(0, entry);
    entries.truncate(bound);
    true
}

/// 历史账本
///
/// 每个流一个按新到旧排列的有界列表，保存在选项存储中。
/// 每次追加同时镜像到统一活动日志（不去重，按 `max_log_entries` 截断）。
pub struct HistoryLedger {
    options: Arc<dyn OptionStore>,
    limits: Limits,
}

impl HistoryLedger {
    pub fn new(options: Arc<dyn OptionStore>, limits: Limits) -> Self {
        Self { options, limits }
    }

    /// 流的条数上限
    pub fn bound(&self, stream: &StreamKey) -> usize {
        match stream {
            StreamKey::ActivityLog => self.limits.max_log_entries,
            _ => self.limits.max_history,
        }
    }

    /// 列出记录，最新的在前
    pub async fn list(&self, stream: &StreamKey) -> Result<Vec<HistoryEntry>> {
        Ok(self.options.load_or_default(&stream.storage_key()).await?)
    }

    pub async fn entry(&self, stream: &StreamKey, index: usize) -> Result<Option<HistoryEntry>> {
        Ok(self.list(stream).await?.into_iter().nth(index))
    }

    /// 追加记录，返回是否写入了流（重复内容不写入）
    pub async fn append(&self, entry: HistoryEntry) -> Result<bool> {
        let stream = entry.stream.clone();
        if stream == StreamKey::ActivityLog {
            self.append_to_log(entry).await?;
            return Ok(true);
        }

        let mut entries = self.list(&stream).await?;
        if !push_bounded(&mut entries, entry.clone(), self.bound(&stream), true) {
            debug!(stream = %stream, "Skipped duplicate history entry");
            return Ok(false);
        }
        self.options.save(&stream.storage_key(), &entries).await?;
        self.append_to_log(entry).await?;
        Ok(true)
    }

    async fn append_to_log(&self, entry: HistoryEntry) -> Result<()> {
        let log = StreamKey::ActivityLog;
        let mut entries = self.list(&log).await?;
        push_bounded(&mut entries, entry, self.bound(&log), false);
        self.options.save(&log.storage_key(), &entries).await?;
        Ok(())
    }

    /// 清空流
    pub async fn clear(&self, stream: &StreamKey) -> Result<()> {
        self.options.delete(&stream.storage_key()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inject_domain::{HistoryAction, Location, RuleSet, Snapshot};
    use inject_infra::MemoryOptionStore;

    fn save(content: &str) -> HistoryEntry {
        HistoryEntry::new(
            StreamKey::Script(Location::Head),
            HistoryAction::Save,
            1,
            "admin",
            Snapshot::Script {
                content: content.to_string(),
                conditions: RuleSet::default(),
            },
        )
    }

    fn ledger(max_history: usize, max_log_entries: usize) -> HistoryLedger {
        HistoryLedger::new(
            Arc::new(MemoryOptionStore::new()),
            Limits {
                max_history,
                max_log_entries,
                ..Limits::default()
            },
        )
    }

    #[test]
    fn test_push_bounded_truncates_tail() {
        let mut entries = Vec::new();
        for content in ["a", "b", "c", "d"] {
            assert!(push_bounded(&mut entries, save(content), 3, true));
        }
        let texts: Vec<String> = entries.iter().filter_map(|e| e.snapshot.as_ref()).map(Snapshot::text).collect();
        assert_eq!(texts, vec!["d", "c", "b"]);
    }

    #[test]
    fn test_push_bounded_dedup_only_against_head() {
        let mut entries = Vec::new();
        assert!(push_bounded(&mut entries, save("a"), 10, true));
        assert!(!push_bounded(&mut entries, save("a"), 10, true));
        assert!(push_bounded(&mut entries, save("b"), 10, true));
        assert!(push_bounded(&mut entries, save("a"), 10, true));
        assert_eq!(entries.len(), 3);
        assert!(push_bounded(&mut entries, save("a"), 10, false));
        assert_eq!(entries.len(), 4);
    }

    #[tokio::test]
    async fn test_append_dedups_and_bounds() {
        let ledger = ledger(3, 100);
        let stream = StreamKey::Script(Location::Head);

        assert!(ledger.append(save("one")).await.unwrap());
        assert!(!ledger.append(save("one")).await.unwrap());
        assert_eq!(ledger.list(&stream).await.unwrap().len(), 1);

        for content in ["two", "three", "four", "five"] {
            ledger.append(save(content)).await.unwrap();
        }
        let texts: Vec<String> = ledger
            .list(&stream)
            .await
            .unwrap()
            .iter()
            .filter_map(|e| e.snapshot.as_ref().map(Snapshot::text))
            .collect();
        assert_eq!(texts, vec!["five", "four", "three"]);
    }

    #[tokio::test]
    async fn test_activity_log_mirrors_and_is_bounded_separately() {
        let ledger = ledger(2, 4);
        for content in ["a", "b", "c"] {
            ledger.append(save(content)).await.unwrap();
        }
        ledger.append(save("c")).await.unwrap();

        let log = ledger.list(&StreamKey::ActivityLog).await.unwrap();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|e| e.stream == StreamKey::Script(Location::Head)));

        ledger.append(save("d")).await.unwrap();
        ledger.append(save("e")).await.unwrap();
        assert_eq!(ledger.list(&StreamKey::ActivityLog).await.unwrap().len(), 4);
        assert_eq!(ledger.list(&StreamKey::Script(Location::Head)).await.unwrap().len(), 2);

        ledger.clear(&StreamKey::ActivityLog).await.unwrap();
        assert!(ledger.list(&StreamKey::ActivityLog).await.unwrap().is_empty());
        assert_eq!(ledger.entry(&StreamKey::Script(Location::Head), 1).await.unwrap().map(|e| e.char_count), Some(1));
    }
}
