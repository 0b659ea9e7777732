use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 管理员账户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub login: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(rename = "applicationPasswords", default)]
    pub application_passwords: Vec<ApplicationPassword>,
    #[serde(default)]
    pub disabled: bool,
}

/// 应用密码（只保存哈希）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPassword {
    pub uuid: String,
    pub name: String,
    #[serde(rename = "passwordHash")]
    pub password_hash: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastUsed", default)]
    pub last_used: Option<DateTime<Utc>>,
}
