use crate::artifact::{ArtifactStore, FileWrite, ManagedFileFields};
use crate::content::ContentValidator;
use crate::error::{Result, ServiceError};
use crate::history::{HistoryLedger, RollbackEngine};
use crate::render::{Fragment, Renderer};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inject_api::{AuthenticatedUser, CapabilityChecker, OptionStore, RequestContext};
use inject_domain::{
    HistoryAction, HistoryEntry, Limits, LinkedUrl, Location, ManagedFile, RuleSet, Snapshot, StreamKey,
};
use inject_infra::{RateLimiter, ScriptStorage};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// 成功响应：结果字段 + 提示信息
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReply<T> {
    #[serde(flatten)]
    pub data: T,
    pub message: String,
}

impl<T> ServiceReply<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptView {
    pub location: Location,
    pub content: String,
    pub conditions: RuleSet,
    #[serde(rename = "charCount")]
    pub char_count: usize,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrlsView {
    pub location: Location,
    pub urls: Vec<LinkedUrl>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilesView {
    pub files: Vec<ManagedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    #[serde(flatten)]
    pub file: ManagedFile,
    pub content: String,
    #[serde(rename = "charCount")]
    pub char_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileWriteView {
    #[serde(flatten)]
    pub file: ManagedFile,
    pub content: String,
    pub created: bool,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub stream: StreamKey,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollbackView {
    pub stream: StreamKey,
    pub index: usize,
    pub content: String,
    #[serde(rename = "charCount")]
    pub char_count: usize,
    pub entry: HistoryEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearedView {
    pub stream: StreamKey,
}

/// 内联脚本写入请求；`conditions` 为None时保留现有条件
#[derive(Debug, Clone, Default)]
pub struct ScriptRequest {
    pub content: String,
    pub conditions: Option<RuleSet>,
}

/// 上传的托管文件
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// 上传时的原始文件名
    pub filename: String,
    pub bytes: Vec<u8>,
    pub location: Location,
    pub label: Option<String>,
    pub conditions: Option<RuleSet>,
}

/// 脚本服务trait
///
/// 管理操作都需要管理能力；渲染不需要。
#[async_trait]
pub trait ScriptService: Send + Sync {
    async fn get_script(&self, actor: &AuthenticatedUser, location: Location) -> Result<ServiceReply<ScriptView>>;

    async fn save_script(
        &self,
        actor: &AuthenticatedUser,
        location: Location,
        request: ScriptRequest,
    ) -> Result<ServiceReply<ScriptView>>;

    async fn get_urls(&self, actor: &AuthenticatedUser, location: Location) -> Result<ServiceReply<UrlsView>>;

    async fn save_urls(
        &self,
        actor: &AuthenticatedUser,
        location: Location,
        urls: Vec<LinkedUrl>,
    ) -> Result<ServiceReply<UrlsView>>;

    async fn list_files(&self, actor: &AuthenticatedUser) -> Result<ServiceReply<FilesView>>;

    async fn get_file(&self, actor: &AuthenticatedUser, id: &str) -> Result<ServiceReply<FileView>>;

    /// 创建（`id` 为None）或更新托管文件
    async fn save_file(
        &self,
        actor: &AuthenticatedUser,
        id: Option<&str>,
        fields: ManagedFileFields,
    ) -> Result<ServiceReply<FileWriteView>>;

    async fn upload_file(&self, actor: &AuthenticatedUser, upload: FileUpload) -> Result<ServiceReply<FileWriteView>>;

    async fn delete_file(&self, actor: &AuthenticatedUser, id: &str) -> Result<ServiceReply<FileWriteView>>;

    async fn history(&self, actor: &AuthenticatedUser, stream: &StreamKey) -> Result<ServiceReply<HistoryView>>;

    async fn rollback(
        &self,
        actor: &AuthenticatedUser,
        stream: &StreamKey,
        index: usize,
    ) -> Result<ServiceReply<RollbackView>>;

    async fn clear_activity_log(&self, actor: &AuthenticatedUser) -> Result<ServiceReply<ClearedView>>;

    async fn render(&self, location: Location, ctx: &RequestContext) -> Result<Vec<Fragment>>;

    async fn render_html(&self, location: Location, ctx: &RequestContext) -> Result<String>;
}

/// 服务设置
#[derive(Debug, Clone, Default)]
pub struct ScriptServiceSettings {
    pub limits: Limits,
    /// 托管文件的公开URL前缀
    pub files_base_url: String,
}

/// 默认脚本服务实现
pub struct DefaultScriptService {
    artifacts: Arc<ArtifactStore>,
    ledger: Arc<HistoryLedger>,
    rollback: RollbackEngine,
    renderer: Renderer,
    capability: Arc<dyn CapabilityChecker>,
}

impl DefaultScriptService {
    pub fn new(
        options: Arc<dyn OptionStore>,
        storage: Arc<dyn ScriptStorage>,
        rate_limiter: Arc<dyn RateLimiter>,
        capability: Arc<dyn CapabilityChecker>,
        settings: ScriptServiceSettings,
    ) -> Result<Self> {
        let validator = ContentValidator::new(&settings.limits)
            .map_err(|e| ServiceError::Backend(format!("content validator: {}", e)))?;
        let artifacts = Arc::new(ArtifactStore::new(
            options.clone(),
            storage,
            validator,
            rate_limiter.clone(),
        ));
        let ledger = Arc::new(HistoryLedger::new(options, settings.limits));
        Ok(Self {
            rollback: RollbackEngine::new(artifacts.clone(), ledger.clone(), rate_limiter),
            renderer: Renderer::new(artifacts.clone(), settings.files_base_url),
            artifacts,
            ledger,
            capability,
        })
    }

    fn authorize(&self, actor: &AuthenticatedUser) -> Result<()> {
        if self.capability.can_manage(actor) {
            Ok(())
        } else {
            warn!(actor = actor.id, username = %actor.username, "Missing manage capability");
            Err(ServiceError::PermissionDenied(format!(
                "{} is not allowed to manage scripts",
                actor.username
            )))
        }
    }

    async fn record(
        &self,
        actor: &AuthenticatedUser,
        stream: StreamKey,
        action: HistoryAction,
        snapshot: Snapshot,
    ) -> Result<bool> {
        let entry = HistoryEntry::new(stream, action, actor.id, actor.display_name.clone(), snapshot);
        self.ledger.append(entry).await
    }

    async fn file_write_reply(
        &self,
        actor: &AuthenticatedUser,
        write: FileWrite,
    ) -> Result<ServiceReply<FileWriteView>> {
        match write {
            FileWrite::Saved {
                file,
                content,
                created,
                warnings,
            } => {
                self.record(
                    actor,
                    StreamKey::file(&file.id),
                    HistoryAction::FileSave,
                    Snapshot::File {
                        file: file.clone(),
                        content: content.clone(),
                    },
                )
                .await?;
                let message = if created {
                    format!("File {} created.", file.filename)
                } else {
                    format!("File {} saved.", file.filename)
                };
                Ok(ServiceReply::new(
                    FileWriteView {
                        file,
                        content,
                        created,
                        deleted: false,
                        warnings,
                    },
                    message,
                ))
            }
            FileWrite::Deleted { file, content } => {
                self.record(
                    actor,
                    StreamKey::file(&file.id),
                    HistoryAction::FileDelete,
                    Snapshot::File {
                        file: file.clone(),
                        content: content.clone(),
                    },
                )
                .await?;
                let message = format!("File {} deleted.", file.filename);
                Ok(ServiceReply::new(
                    FileWriteView {
                        file,
                        content,
                        created: false,
                        deleted: true,
                        warnings: Vec::new(),
                    },
                    message,
                ))
            }
        }
    }
}

fn title(location: Location) -> &'static str {
    match location {
        Location::Head => "Head",
        Location::Footer => "Footer",
    }
}

#[async_trait]
impl ScriptService for DefaultScriptService {
    async fn get_script(&self, actor: &AuthenticatedUser, location: Location) -> Result<ServiceReply<ScriptView>> {
        self.authorize(actor)?;
        let script = self.artifacts.get_inline_script(location).await?;
        Ok(ServiceReply::new(
            ScriptView {
                location,
                char_count: script.content.chars().count(),
                content: script.content,
                conditions: script.conditions,
                updated_at: script.updated_at,
                warnings: Vec::new(),
            },
            format!("{} script loaded.", title(location)),
        ))
    }

    async fn save_script(
        &self,
        actor: &AuthenticatedUser,
        location: Location,
        request: ScriptRequest,
    ) -> Result<ServiceReply<ScriptView>> {
        self.authorize(actor)?;
        let write = self
            .artifacts
            .set_inline_script(actor.id, location, &request.content, request.conditions)
            .await?;
        let script = write.script;

        let stream = StreamKey::Script(location);
        let recorded = self
            .record(
                actor,
                stream.clone(),
                HistoryAction::Save,
                Snapshot::Script {
                    content: script.content.clone(),
                    conditions: script.conditions.clone(),
                },
            )
            .await?;

        let char_count = script.content.chars().count();
        info!(stream = %stream, actor = actor.id, chars = char_count, recorded, "Script saved");
        let message = if recorded {
            format!("{} script saved.", title(location))
        } else {
            format!("{} script saved (content unchanged).", title(location))
        };
        Ok(ServiceReply::new(
            ScriptView {
                location,
                content: script.content,
                conditions: script.conditions,
                char_count,
                updated_at: script.updated_at,
                warnings: write.warnings,
            },
            message,
        ))
    }

    async fn get_urls(&self, actor: &AuthenticatedUser, location: Location) -> Result<ServiceReply<UrlsView>> {
        self.authorize(actor)?;
        let urls = self.artifacts.get_linked_urls(location).await?;
        Ok(ServiceReply::new(
            UrlsView { location, urls },
            format!("{} URLs loaded.", title(location)),
        ))
    }

    async fn save_urls(
        &self,
        actor: &AuthenticatedUser,
        location: Location,
        urls: Vec<LinkedUrl>,
    ) -> Result<ServiceReply<UrlsView>> {
        self.authorize(actor)?;
        let urls = self.artifacts.set_linked_urls(actor.id, location, urls).await?;

        let stream = StreamKey::Urls(location);
        self.record(
            actor,
            stream.clone(),
            HistoryAction::UrlSave,
            Snapshot::Urls { urls: urls.clone() },
        )
        .await?;

        info!(stream = %stream, actor = actor.id, count = urls.len(), "URLs saved");
        let message = format!("{} URLs saved ({}).", title(location), urls.len());
        Ok(ServiceReply::new(UrlsView { location, urls }, message))
    }

    async fn list_files(&self, actor: &AuthenticatedUser) -> Result<ServiceReply<FilesView>> {
        self.authorize(actor)?;
        let files = self.artifacts.get_managed_files().await?;
        let message = format!("{} managed files.", files.len());
        Ok(ServiceReply::new(FilesView { files }, message))
    }

    async fn get_file(&self, actor: &AuthenticatedUser, id: &str) -> Result<ServiceReply<FileView>> {
        self.authorize(actor)?;
        let file = self.artifacts.get_managed_file(id).await?;
        let content = self.artifacts.read_content(&file)?;
        let message = format!("File {} loaded.", file.filename);
        Ok(ServiceReply::new(
            FileView {
                char_count: content.chars().count(),
                file,
                content,
            },
            message,
        ))
    }

    async fn save_file(
        &self,
        actor: &AuthenticatedUser,
        id: Option<&str>,
        fields: ManagedFileFields,
    ) -> Result<ServiceReply<FileWriteView>> {
        self.authorize(actor)?;
        let write = self.artifacts.set_managed_file(actor.id, id, fields).await?;
        self.file_write_reply(actor, write).await
    }

    async fn upload_file(&self, actor: &AuthenticatedUser, upload: FileUpload) -> Result<ServiceReply<FileWriteView>> {
        self.authorize(actor)?;
        let validated = self.artifacts.validator().validate_file(&upload.bytes)?;
        let label = match upload.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => {
                let name = upload.filename.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
                name.rsplit_once('.').map_or(name, |(stem, _)| stem).to_string()
            }
        };
        let fields = ManagedFileFields {
            label,
            filename: Some(upload.filename),
            location: upload.location,
            conditions: upload.conditions,
            content: validated.content,
            enabled: Some(true),
        };

        let mut reply = self.save_file(actor, None, fields).await?;
        let mut warnings = validated.warnings;
        warnings.append(&mut reply.data.warnings);
        reply.data.warnings = warnings;
        Ok(reply)
    }

    async fn delete_file(&self, actor: &AuthenticatedUser, id: &str) -> Result<ServiceReply<FileWriteView>> {
        self.authorize(actor)?;
        let (file, content) = self.artifacts.delete_managed_file(actor.id, id).await?;
        self.file_write_reply(actor, FileWrite::Deleted { file, content }).await
    }

    async fn history(&self, actor: &AuthenticatedUser, stream: &StreamKey) -> Result<ServiceReply<HistoryView>> {
        self.authorize(actor)?;
        let entries = self.ledger.list(stream).await?;
        let message = format!("{} history entries.", entries.len());
        Ok(ServiceReply::new(
            HistoryView {
                stream: stream.clone(),
                entries,
            },
            message,
        ))
    }

    async fn rollback(
        &self,
        actor: &AuthenticatedUser,
        stream: &StreamKey,
        index: usize,
    ) -> Result<ServiceReply<RollbackView>> {
        self.authorize(actor)?;
        let outcome = self
            .rollback
            .rollback(actor.id, &actor.display_name, stream, index)
            .await?;
        let message = format!("Restored {} from revision {}.", outcome.stream, outcome.index);
        Ok(ServiceReply::new(
            RollbackView {
                stream: outcome.stream,
                index: outcome.index,
                content: outcome.content,
                char_count: outcome.char_count,
                entry: outcome.entry,
            },
            message,
        ))
    }

    async fn clear_activity_log(&self, actor: &AuthenticatedUser) -> Result<ServiceReply<ClearedView>> {
        self.authorize(actor)?;
        self.ledger.clear(&StreamKey::ActivityLog).await?;
        info!(actor = actor.id, "Activity log cleared");
        Ok(ServiceReply::new(
            ClearedView {
                stream: StreamKey::ActivityLog,
            },
            "Activity log cleared.",
        ))
    }

    async fn render(&self, location: Location, ctx: &RequestContext) -> Result<Vec<Fragment>> {
        self.renderer.render(location, ctx).await
    }

    async fn render_html(&self, location: Location, ctx: &RequestContext) -> Result<String> {
        self.renderer.render_html(location, ctx).await
    }
}
