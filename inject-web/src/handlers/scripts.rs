use super::{parse_location, RollbackBody};
use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use inject_domain::StreamKey;
use inject_service::{
    parse_conditions, HistoryView, RollbackView, ScriptRequest, ScriptView, ServiceReply,
};
use serde::Deserialize;
use serde_json::Value;

/// 内联脚本写入请求体
#[derive(Debug, Deserialize)]
pub struct ScriptBody {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub conditions: Option<Value>,
}

/// 获取内联脚本
/// GET /api/v1/scripts/:location
pub async fn get_script(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location): Path<String>,
) -> Result<Json<ServiceReply<ScriptView>>, ApiError> {
    let location = parse_location(&location)?;
    Ok(Json(state.script_service.get_script(&user, location).await?))
}

/// 保存内联脚本
/// PUT /api/v1/scripts/:location
pub async fn save_script(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location): Path<String>,
    body: Result<Json<ScriptBody>, JsonRejection>,
) -> Result<Json<ServiceReply<ScriptView>>, ApiError> {
    let location = parse_location(&location)?;
    let Json(body) = body?;
    let request = ScriptRequest {
        content: body.content,
        conditions: parse_conditions(body.conditions)?,
    };
    Ok(Json(state.script_service.save_script(&user, location, request).await?))
}

/// 内联脚本历史
/// GET /api/v1/scripts/:location/history
pub async fn script_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location): Path<String>,
) -> Result<Json<ServiceReply<HistoryView>>, ApiError> {
    let stream = StreamKey::Script(parse_location(&location)?);
    Ok(Json(state.script_service.history(&user, &stream).await?))
}

/// 回滚内联脚本
/// POST /api/v1/scripts/:location/rollback
pub async fn rollback_script(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location): Path<String>,
    body: Result<Json<RollbackBody>, JsonRejection>,
) -> Result<Json<ServiceReply<RollbackView>>, ApiError> {
    let stream = StreamKey::Script(parse_location(&location)?);
    let Json(body) = body?;
    Ok(Json(state.script_service.rollback(&user, &stream, body.index).await?))
}
