use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 认证后的操作者信息
///
/// 所有写操作和历史记录都以它为操作者。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: u64,
    pub username: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub capabilities: Vec<String>,
}

impl AuthenticatedUser {
    pub fn new(id: u64, username: impl Into<String>, capabilities: Vec<String>) -> Self {
        let username = username.into();
        Self {
            id,
            display_name: username.clone(),
            username,
            capabilities,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// 检查用户是否具有指定的能力
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// 认证结果
#[derive(Debug, Clone)]
pub enum AuthenticationResult {
    /// 认证成功
    Authenticated(AuthenticatedUser),
    /// 未认证（没有提供凭证）
    Unauthenticated,
    /// 认证失败（凭证无效）
    Failed(String),
}

/// 请求信息（用于认证）
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub method: String,
    pub path: String,
    /// 头名称统一为小写
    pub headers: HashMap<String, String>,
}

impl AuthRequest {
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.get(name)
    }
}

/// 认证提供者trait
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// 尝试从请求中认证用户
    async fn authenticate(
        &self,
        request: &AuthRequest,
    ) -> Result<AuthenticationResult, Box<dyn std::error::Error + Send + Sync>>;

    /// 数字越小优先级越高
    fn priority(&self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_user() {
        let user = AuthenticatedUser::new(
            7,
            "editor",
            vec!["manage_options".to_string(), "edit_posts".to_string()],
        )
        .with_display_name("Site Editor");

        assert_eq!(user.id, 7);
        assert_eq!(user.username, "editor");
        assert_eq!(user.display_name, "Site Editor");
        assert!(user.has_capability("manage_options"));
        assert!(!user.has_capability("delete_users"));
    }

    #[test]
    fn test_auth_request_header_lookup() {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), "Basic abc".to_string());
        let request = AuthRequest {
            method: "GET".to_string(),
            path: "/api/v1/scripts/head".to_string(),
            headers,
        };
        assert_eq!(request.get_header("authorization").map(String::as_str), Some("Basic abc"));
        assert!(request.get_header("cookie").is_none());
    }
}
