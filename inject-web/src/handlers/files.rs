use super::{parse_location, RollbackBody};
use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use inject_domain::StreamKey;
use inject_service::{
    parse_conditions, FileUpload, FileView, FileWriteView, FilesView, HistoryView, ManagedFileFields,
    RollbackView, ServiceReply,
};
use serde::Deserialize;
use serde_json::Value;

/// 托管文件创建/更新请求体；`id` 存在时为更新
#[derive(Debug, Deserialize)]
pub struct FileBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub filename: Option<String>,
    pub location: String,
    #[serde(default)]
    pub conditions: Option<Value>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// 托管文件列表
/// GET /api/v1/files
pub async fn list_files(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ServiceReply<FilesView>>, ApiError> {
    Ok(Json(state.script_service.list_files(&user).await?))
}

/// 创建或更新托管文件
/// POST /api/v1/files
pub async fn save_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<FileBody>, JsonRejection>,
) -> Result<Json<ServiceReply<FileWriteView>>, ApiError> {
    let Json(body) = body?;
    let fields = ManagedFileFields {
        label: body.label,
        filename: body.filename,
        location: parse_location(&body.location)?,
        conditions: parse_conditions(body.conditions)?,
        content: body.content,
        enabled: body.enabled,
    };
    let id = body.id.as_deref().map(str::trim).filter(|id| !id.is_empty());
    Ok(Json(state.script_service.save_file(&user, id, fields).await?))
}

/// 上传托管文件
/// POST /api/v1/files/upload
///
/// 表单字段：`file`（必填）、`location`（默认footer）、`label`、`conditions`（JSON文本）。
pub async fn upload_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ServiceReply<FileWriteView>>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut location = None;
    let mut label = None;
    let mut conditions = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload.js").to_string();
                let bytes = field.bytes().await?;
                file = Some((filename, bytes.to_vec()));
            }
            "location" => location = Some(parse_location(&field.text().await?)?),
            "label" => label = Some(field.text().await?),
            "conditions" => conditions = Some(Value::String(field.text().await?)),
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| ApiError::bad_request("invalid_upload", "missing file field"))?;
    let upload = FileUpload {
        filename,
        bytes,
        location: location.unwrap_or(inject_domain::Location::Footer),
        label,
        conditions: parse_conditions(conditions)?,
    };
    Ok(Json(state.script_service.upload_file(&user, upload).await?))
}

/// 获取托管文件（含内容）
/// GET /api/v1/files/:id
pub async fn get_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ServiceReply<FileView>>, ApiError> {
    Ok(Json(state.script_service.get_file(&user, &id).await?))
}

/// 删除托管文件
/// DELETE /api/v1/files/:id
pub async fn delete_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ServiceReply<FileWriteView>>, ApiError> {
    Ok(Json(state.script_service.delete_file(&user, &id).await?))
}

/// 托管文件历史
/// GET /api/v1/files/:id/history
pub async fn file_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ServiceReply<HistoryView>>, ApiError> {
    Ok(Json(state.script_service.history(&user, &StreamKey::file(id)).await?))
}

/// 回滚托管文件（可恢复已删除的文件）
/// POST /api/v1/files/:id/rollback
pub async fn rollback_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<RollbackBody>, JsonRejection>,
) -> Result<Json<ServiceReply<RollbackView>>, ApiError> {
    let Json(body) = body?;
    Ok(Json(
        state.script_service.rollback(&user, &StreamKey::file(id), body.index).await?,
    ))
}
