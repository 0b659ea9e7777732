use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use inject_domain::StreamKey;
use inject_service::{ClearedView, HistoryView, ServiceReply};

/// 统一活动日志
/// GET /api/v1/activity
pub async fn list_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ServiceReply<HistoryView>>, ApiError> {
    Ok(Json(state.script_service.history(&user, &StreamKey::ActivityLog).await?))
}

/// 清空活动日志
/// DELETE /api/v1/activity
pub async fn clear_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ServiceReply<ClearedView>>, ApiError> {
    Ok(Json(state.script_service.clear_activity_log(&user).await?))
}
