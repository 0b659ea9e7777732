use crate::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use inject_api::{AuthRequest, AuthenticationResult};
use std::collections::HashMap;
use tracing::debug;

/// 认证中间件
/// 从请求中提取认证信息，调用认证服务，将用户信息注入请求扩展。
/// 未认证的请求继续向下传递，由 `CurrentUser` 提取器拒绝。
pub async fn auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let mut headers = HashMap::new();
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }
    let auth_request = AuthRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        headers,
    };

    match state.auth_service.authenticate(&auth_request).await {
        AuthenticationResult::Authenticated(user) => {
            request.extensions_mut().insert(user);
        }
        AuthenticationResult::Failed(reason) => {
            debug!(path = %auth_request.path, reason = %reason, "Authentication failed");
        }
        AuthenticationResult::Unauthenticated => {}
    }

    next.run(request).await
}
