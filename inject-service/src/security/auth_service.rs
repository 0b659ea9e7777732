use inject_api::{AuthRequest, AuthenticationProvider, AuthenticationResult};
use tracing::warn;

/// 认证服务（整合所有认证提供者）
///
/// 提供者按优先级排序，启动时组装完毕，之后只读。
#[derive(Default)]
pub struct AuthService {
    providers: Vec<Box<dyn AuthenticationProvider>>,
}

impl AuthService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加认证提供者
    pub fn with_provider(mut self, provider: Box<dyn AuthenticationProvider>) -> Self {
        self.providers.push(provider);
        self.providers.sort_by_key(|p| p.priority());
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// 认证请求
    ///
    /// 第一个给出结论（成功或失败）的提供者决定结果；提供者出错时记录日志并继续。
    pub async fn authenticate(&self, request: &AuthRequest) -> AuthenticationResult {
        for provider in &self.providers {
            match provider.authenticate(request).await {
                Ok(AuthenticationResult::Unauthenticated) => continue,
                Ok(result) => return result,
                Err(e) => {
                    warn!(priority = provider.priority(), error = %e, "Authentication provider error");
                    continue;
                }
            }
        }
        AuthenticationResult::Unauthenticated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use inject_api::AuthenticatedUser;

    struct Fixed(u32, Option<AuthenticationResult>);

    #[async_trait]
    impl AuthenticationProvider for Fixed {
        async fn authenticate(
            &self,
            _request: &AuthRequest,
        ) -> Result<AuthenticationResult, Box<dyn std::error::Error + Send + Sync>> {
            self.1.clone().ok_or_else(|| "backend down".into())
        }

        fn priority(&self) -> u32 {
            self.0
        }
    }

    #[tokio::test]
    async fn test_priority_order_and_fallthrough() {
        let user = AuthenticatedUser::new(1, "admin", vec![]);
        let service = AuthService::new()
            .with_provider(Box::new(Fixed(20, Some(AuthenticationResult::Authenticated(user)))))
            .with_provider(Box::new(Fixed(5, None)))
            .with_provider(Box::new(Fixed(10, Some(AuthenticationResult::Unauthenticated))));
        assert_eq!(service.provider_count(), 3);

        match service.authenticate(&AuthRequest::default()).await {
            AuthenticationResult::Authenticated(u) => assert_eq!(u.username, "admin"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_stops_chain() {
        let user = AuthenticatedUser::new(1, "admin", vec![]);
        let service = AuthService::new()
            .with_provider(Box::new(Fixed(1, Some(AuthenticationResult::Failed("bad password".into())))))
            .with_provider(Box::new(Fixed(2, Some(AuthenticationResult::Authenticated(user)))));
        assert!(matches!(
            service.authenticate(&AuthRequest::default()).await,
            AuthenticationResult::Failed(_)
        ));
        assert!(matches!(
            AuthService::new().authenticate(&AuthRequest::default()).await,
            AuthenticationResult::Unauthenticated
        ));
    }
}
