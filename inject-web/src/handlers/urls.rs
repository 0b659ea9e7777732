use super::{parse_location, RollbackBody};
use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use inject_domain::{LinkedUrl, StreamKey};
use inject_service::{parse_conditions, HistoryView, RollbackView, ServiceReply, UrlsView};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct UrlItem {
    pub url: String,
    #[serde(default)]
    pub conditions: Option<Value>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UrlsBody {
    #[serde(default)]
    pub urls: Vec<UrlItem>,
}

/// 获取外部URL列表
/// GET /api/v1/urls/:location
pub async fn get_urls(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location): Path<String>,
) -> Result<Json<ServiceReply<UrlsView>>, ApiError> {
    let location = parse_location(&location)?;
    Ok(Json(state.script_service.get_urls(&user, location).await?))
}

/// 保存外部URL列表（整体替换）
/// PUT /api/v1/urls/:location
pub async fn save_urls(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location): Path<String>,
    body: Result<Json<UrlsBody>, JsonRejection>,
) -> Result<Json<ServiceReply<UrlsView>>, ApiError> {
    let location = parse_location(&location)?;
    let Json(body) = body?;
    let mut urls = Vec::with_capacity(body.urls.len());
    for item in body.urls {
        let mut linked = LinkedUrl::new(item.url);
        if let Some(conditions) = parse_conditions(item.conditions)? {
            linked.conditions = conditions;
        }
        linked.enabled = item.enabled.unwrap_or(true);
        urls.push(linked);
    }
    Ok(Json(state.script_service.save_urls(&user, location, urls).await?))
}

/// 外部URL历史
/// GET /api/v1/urls/:location/history
pub async fn urls_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location): Path<String>,
) -> Result<Json<ServiceReply<HistoryView>>, ApiError> {
    let stream = StreamKey::Urls(parse_location(&location)?);
    Ok(Json(state.script_service.history(&user, &stream).await?))
}

/// 回滚外部URL列表
/// POST /api/v1/urls/:location/rollback
pub async fn rollback_urls(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(location): Path<String>,
    body: Result<Json<RollbackBody>, JsonRejection>,
) -> Result<Json<ServiceReply<RollbackView>>, ApiError> {
    let stream = StreamKey::Urls(parse_location(&location)?);
    let Json(body) = body?;
    Ok(Json(state.script_service.rollback(&user, &stream, body.index).await?))
}
