use crate::artifact::{LinkedUrl, Location, ManagedFile};
use crate::condition::RuleSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 历史流键
///
/// 区分不同的历史序列和限流序列：`head-script`、`footer-urls`、`file:<id>`、`activity-log`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StreamKey {
    Script(Location),
    Urls(Location),
    File(String),
    ActivityLog,
}

impl StreamKey {
    pub fn file(id: impl Into<String>) -> Self {
        StreamKey::File(id.into())
    }

    /// 历史记录在选项存储中的键
    pub fn storage_key(&self) -> String {
        format!("{}{}", crate::constant::HISTORY_KEY_PREFIX, self)
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKey::Script(location) => write!(f, "{}-script", location),
            StreamKey::Urls(location) => write!(f, "{}-urls", location),
            StreamKey::File(id) => write!(f, "file:{}", id),
            StreamKey::ActivityLog => f.write_str("activity-log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stream key: {0}")]
pub struct ParseStreamKeyError(pub String);

impl FromStr for StreamKey {
    type Err = ParseStreamKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "activity-log" {
            return Ok(StreamKey::ActivityLog);
        }
        if let Some(id) = s.strip_prefix("file:") {
            if id.is_empty() {
                return Err(ParseStreamKeyError(s.to_string()));
            }
            return Ok(StreamKey::File(id.to_string()));
        }
        if let Some(location) = s.strip_suffix("-script") {
            return location
                .parse()
                .map(StreamKey::Script)
                .map_err(|_| ParseStreamKeyError(s.to_string()));
        }
        if let Some(location) = s.strip_suffix("-urls") {
            return location
                .parse()
                .map(StreamKey::Urls)
                .map_err(|_| ParseStreamKeyError(s.to_string()));
        }
        Err(ParseStreamKeyError(s.to_string()))
    }
}

impl TryFrom<String> for StreamKey {
    type Error = ParseStreamKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StreamKey> for String {
    fn from(key: StreamKey) -> Self {
        key.to_string()
    }
}

/// 历史动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Save,
    Rollback,
    UrlSave,
    UrlRollback,
    FileSave,
    FileDelete,
    FileRollback,
}

impl HistoryAction {
    pub fn is_rollback(&self) -> bool {
        matches!(
            self,
            HistoryAction::Rollback | HistoryAction::UrlRollback | HistoryAction::FileRollback
        )
    }
}

/// 可独立回滚的完整快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
    Script { content: String, conditions: RuleSet },
    Urls { urls: Vec<LinkedUrl> },
    File { file: ManagedFile, content: String },
}

impl Snapshot {
    /// 快照的文本形式；URL列表按行拼接
    pub fn text(&self) -> String {
        match self {
            Snapshot::Script { content, .. } | Snapshot::File { content, .. } => content.clone(),
            Snapshot::Urls { urls } => urls
                .iter()
                .map(|u| u.url.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn char_count(&self) -> usize {
        match self {
            Snapshot::Script { content, .. } | Snapshot::File { content, .. } => content.chars().count(),
            Snapshot::Urls { .. } => self.text().chars().count(),
        }
    }

    /// 内容是否完全相同（只比较内容，不比较条件）
    pub fn same_content(&self, other: &Snapshot) -> bool {
        match (self, other) {
            (Snapshot::Script { content: a, .. }, Snapshot::Script { content: b, .. }) => a == b,
            (Snapshot::Urls { urls: a }, Snapshot::Urls { urls: b }) => a == b,
            (Snapshot::File { content: a, .. }, Snapshot::File { content: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// 不可变的历史记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "actorId")]
    pub actor_id: u64,
    #[serde(rename = "actorName")]
    pub actor_name: String,
    pub stream: StreamKey,
    pub action: HistoryAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    #[serde(rename = "charCount")]
    pub char_count: usize,
}

impl HistoryEntry {
    pub fn new(
        stream: StreamKey,
        action: HistoryAction,
        actor_id: u64,
        actor_name: impl Into<String>,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            actor_id,
            actor_name: actor_name.into(),
            stream,
            action,
            char_count: snapshot.char_count(),
            snapshot: Some(snapshot),
        }
    }

    /// 是否与队首记录重复
    ///
    /// 删除和回滚记录永远不算重复，紧跟在删除之后的记录也不算。
    pub fn duplicates(&self, head: &HistoryEntry) -> bool {
        if self.action.is_rollback()
            || self.action == HistoryAction::FileDelete
            || head.action == HistoryAction::FileDelete
        {
            return false;
        }
        match (&self.snapshot, &head.snapshot) {
            (Some(a), Some(b)) => a.same_content(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(content: &str) -> Snapshot {
        Snapshot::Script {
            content: content.to_string(),
            conditions: RuleSet::default(),
        }
    }

    #[test]
    fn test_stream_key_round_trip_strings() {
        for raw in ["head-script", "footer-script", "head-urls", "footer-urls", "file:tracker", "activity-log"] {
            let key: StreamKey = raw.parse().unwrap();
            assert_eq!(key.to_string(), raw);
        }
        assert!("body-script".parse::<StreamKey>().is_err());
        assert!("file:".parse::<StreamKey>().is_err());
        assert!("nonsense".parse::<StreamKey>().is_err());
    }

    #[test]
    fn test_storage_key() {
        assert_eq!(
            StreamKey::Script(Location::Head).storage_key(),
            "inject_history:head-script"
        );
    }

    #[test]
    fn test_entry_counts_chars() {
        let entry = HistoryEntry::new(
            StreamKey::Script(Location::Head),
            HistoryAction::Save,
            1,
            "admin",
            script("héllo"),
        );
        assert_eq!(entry.char_count, 5);
    }

    #[test]
    fn test_duplicates_ignores_conditions_but_not_deletes() {
        let stream = StreamKey::file("tracker");
        let file = ManagedFile {
            id: "tracker".into(),
            label: "Tracker".into(),
            filename: "tracker.js".into(),
            location: Location::Footer,
            conditions: RuleSet::default(),
            enabled: true,
            version: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let snapshot = Snapshot::File { file, content: "x()".into() };
        let save = HistoryEntry::new(stream.clone(), HistoryAction::FileSave, 1, "a", snapshot.clone());
        let again = HistoryEntry::new(stream.clone(), HistoryAction::FileSave, 1, "a", snapshot.clone());
        let rollback = HistoryEntry::new(stream.clone(), HistoryAction::FileRollback, 1, "a", snapshot.clone());
        let delete = HistoryEntry::new(stream, HistoryAction::FileDelete, 1, "a", snapshot);

        assert!(again.duplicates(&save));
        assert!(!rollback.duplicates(&save));
        assert!(!delete.duplicates(&save));
        assert!(!again.duplicates(&delete));
    }

    #[test]
    fn test_entry_serialized_shape() {
        let entry = HistoryEntry::new(
            StreamKey::Urls(Location::Footer),
            HistoryAction::UrlSave,
            3,
            "editor",
            Snapshot::Urls { urls: vec![LinkedUrl::new("https://a.example/x.js")] },
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["stream"], "footer-urls");
        assert_eq!(value["action"], "url_save");
        assert_eq!(value["actorId"], 3);
        assert_eq!(value["snapshot"]["kind"], "urls");
        assert_eq!(value["charCount"], 22);

        let back: HistoryEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }
}
