use crate::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use inject_api::AuthenticatedUser;

/// 当前用户提取器
/// 从请求扩展中提取已认证的用户信息
pub struct CurrentUser(pub AuthenticatedUser);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(ApiError::unauthorized)
    }
}
