use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use inject_api::{AuthRequest, AuthenticationProvider, AuthenticationResult};
use inject_service::security::to_authenticated_user;
use inject_service::AccountService;
use std::sync::Arc;

/// HTTP Basic认证提供者
///
/// 密码为账户的应用密码（分组空格可有可无）。
pub struct BasicAuthProvider {
    account_service: Arc<dyn AccountService>,
}

impl BasicAuthProvider {
    pub fn new(account_service: Arc<dyn AccountService>) -> Self {
        Self { account_service }
    }
}

#[async_trait]
impl AuthenticationProvider for BasicAuthProvider {
    async fn authenticate(
        &self,
        request: &AuthRequest,
    ) -> Result<AuthenticationResult, Box<dyn std::error::Error + Send + Sync>> {
        let Some(auth_header) = request.get_header("authorization") else {
            return Ok(AuthenticationResult::Unauthenticated);
        };
        let Some(encoded) = auth_header.strip_prefix("Basic ") else {
            return Ok(AuthenticationResult::Unauthenticated);
        };

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| format!("Base64 decode error: {}", e))?;
        let credentials = String::from_utf8(decoded).map_err(|e| format!("UTF-8 decode error: {}", e))?;

        let Some((login, password)) = credentials.split_once(':') else {
            return Ok(AuthenticationResult::Failed("Invalid credentials format".to_string()));
        };

        match self.account_service.authenticate(login, password).await? {
            Some(account) => Ok(AuthenticationResult::Authenticated(to_authenticated_user(&account))),
            None => Ok(AuthenticationResult::Failed("Invalid application password".to_string())),
        }
    }

    fn priority(&self) -> u32 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inject_api::MANAGE_CAPABILITY;
    use inject_infra::MemoryOptionStore;
    use inject_service::{DefaultAccountService, DefaultPasswordService, PasswordAlgorithm};
    use std::collections::HashMap;

    fn request(authorization: Option<String>) -> AuthRequest {
        let mut headers = HashMap::new();
        if let Some(value) = authorization {
            headers.insert("authorization".to_string(), value);
        }
        AuthRequest {
            method: "GET".into(),
            path: "/api/v1/scripts/head".into(),
            headers,
        }
    }

    #[tokio::test]
    async fn test_basic_auth_with_application_password() {
        let accounts = Arc::new(DefaultAccountService::new(
            Arc::new(MemoryOptionStore::new()),
            Arc::new(DefaultPasswordService::new(PasswordAlgorithm::Bcrypt).with_bcrypt_cost(4)),
        ));
        accounts
            .create_account("admin", "Admin", vec![MANAGE_CAPABILITY.to_string()])
            .await
            .unwrap();
        let (plain, _) = accounts.create_application_password("admin", "test").await.unwrap();
        let provider = BasicAuthProvider::new(accounts);

        let header = format!("Basic {}", STANDARD.encode(format!("admin:{}", plain)));
        match provider.authenticate(&request(Some(header))).await.unwrap() {
            AuthenticationResult::Authenticated(user) => {
                assert_eq!(user.id, 1);
                assert!(user.has_capability(MANAGE_CAPABILITY));
            }
            other => panic!("unexpected {:?}", other),
        }

        let wrong = format!("Basic {}", STANDARD.encode("admin:nope"));
        assert!(matches!(
            provider.authenticate(&request(Some(wrong))).await.unwrap(),
            AuthenticationResult::Failed(_)
        ));
        assert!(matches!(
            provider.authenticate(&request(None)).await.unwrap(),
            AuthenticationResult::Unauthenticated
        ));
        assert!(matches!(
            provider.authenticate(&request(Some("Bearer abc".into()))).await.unwrap(),
            AuthenticationResult::Unauthenticated
        ));
    }
}
