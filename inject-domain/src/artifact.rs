use crate::condition::RuleSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 注入位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Head,
    Footer,
}

impl Location {
    pub const ALL: [Location; 2] = [Location::Head, Location::Footer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Head => "head",
            Location::Footer => "footer",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown location: {0} (expected head or footer)")]
pub struct ParseLocationError(pub String);

impl FromStr for Location {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "head" => Ok(Location::Head),
            "footer" => Ok(Location::Footer),
            other => Err(ParseLocationError(other.to_string())),
        }
    }
}

/// 某个位置的内联脚本
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InlineScript {
    pub content: String,
    /// 位置级加载条件
    #[serde(default)]
    pub conditions: RuleSet,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// 外部脚本URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedUrl {
    pub url: String,
    #[serde(default)]
    pub conditions: RuleSet,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl LinkedUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            conditions: RuleSet::default(),
            enabled: true,
        }
    }

    pub fn with_conditions(mut self, conditions: RuleSet) -> Self {
        self.conditions = conditions;
        self
    }
}

/// 托管脚本文件的元数据
///
/// `id` 由标签生成且在实例内唯一；`filename` 在磁盘目录内唯一。
/// 文件内容保存在磁盘上，不在元数据中。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedFile {
    pub id: String,
    pub label: String,
    pub filename: String,
    pub location: Location,
    #[serde(default)]
    pub conditions: RuleSet,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 内容哈希前缀，保存时计算，用作前台URL的缓存版本号
    #[serde(default)]
    pub version: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}
