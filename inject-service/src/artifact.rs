//! 产物存储
//!
//! 两条写入路径：
//! - 校验写入（`set_*`）：内容校验 + 限流门 + 持久化；
//! - 可信恢复（`restore_*`）：跳过校验和限流，只供回滚使用。
//!
//! 两条路径共用同一组底层写入函数。托管文件总是先写磁盘再写元数据。

use crate::content::{
    filename_from_label, sanitize_filename, unique_filename, unique_id, ContentValidator,
};
use crate::error::{Result, ServiceError};
use chrono::Utc;
use inject_api::OptionStore;
use inject_domain::constant::{
    FOOTER_SCRIPT_KEY, FOOTER_URLS_KEY, HEAD_SCRIPT_KEY, HEAD_URLS_KEY, MANAGED_FILES_KEY,
};
use inject_domain::{HistoryEntry, InlineScript, LinkedUrl, Location, ManagedFile, RuleSet, StreamKey};
use inject_infra::{Acquire, RateLimiter, ScriptStorage};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 托管文件的可编辑字段
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManagedFileFields {
    pub label: String,
    #[serde(default)]
    pub filename: Option<String>,
    pub location: Location,
    #[serde(default)]
    pub conditions: Option<RuleSet>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// 内联脚本写入结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptWrite {
    pub script: InlineScript,
    pub warnings: Vec<String>,
}

/// 托管文件写入结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileWrite {
    Saved {
        file: ManagedFile,
        content: String,
        created: bool,
        warnings: Vec<String>,
    },
    /// 提交空内容等同于删除
    Deleted { file: ManagedFile, content: String },
}

pub struct ArtifactStore {
    options: Arc<dyn OptionStore>,
    storage: Arc<dyn ScriptStorage>,
    validator: ContentValidator,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl ArtifactStore {
    pub fn new(
        options: Arc<dyn OptionStore>,
        storage: Arc<dyn ScriptStorage>,
        validator: ContentValidator,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            options,
            storage,
            validator,
            rate_limiter,
        }
    }

    pub fn validator(&self) -> &ContentValidator {
        &self.validator
    }

    // ---- 内联脚本 ----

    pub async fn get_inline_script(&self, location: Location) -> Result<InlineScript> {
        Ok(self.options.load_or_default(script_key(location)).await?)
    }

    /// 校验写入内联脚本；`conditions` 为None时保留现有条件
    pub async fn set_inline_script(
        &self,
        actor_id: u64,
        location: Location,
        content: &str,
        conditions: Option<RuleSet>,
    ) -> Result<ScriptWrite> {
        let validated = self.validator.validate_script(content)?;
        let current = self.get_inline_script(location).await?;
        let script = InlineScript {
            content: validated.content,
            conditions: conditions.unwrap_or(current.conditions),
            updated_at: Some(Utc::now()),
        };

        let stream = StreamKey::Script(location);
        self.acquire(actor_id, &stream).await?;
        if let Err(e) = self.options.save(script_key(location), &script).await {
            self.release(actor_id, &stream).await;
            return Err(e.into());
        }

        debug!(stream = %stream, actor = actor_id, "Inline script stored");
        Ok(ScriptWrite {
            script,
            warnings: validated.warnings,
        })
    }

    /// 可信恢复内联脚本
    pub async fn restore_inline_script(
        &self,
        location: Location,
        content: String,
        conditions: RuleSet,
    ) -> Result<InlineScript> {
        let script = InlineScript {
            content,
            conditions,
            updated_at: Some(Utc::now()),
        };
        self.options.save(script_key(location), &script).await?;
        Ok(script)
    }

    // ---- 外部URL ----

    pub async fn get_linked_urls(&self, location: Location) -> Result<Vec<LinkedUrl>> {
        Ok(self.options.load_or_default(urls_key(location)).await?)
    }

    pub async fn set_linked_urls(
        &self,
        actor_id: u64,
        location: Location,
        urls: Vec<LinkedUrl>,
    ) -> Result<Vec<LinkedUrl>> {
        let urls = self.validator.validate_urls(urls)?;

        let stream = StreamKey::Urls(location);
        self.acquire(actor_id, &stream).await?;
        if let Err(e) = self.options.save(urls_key(location), &urls).await {
            self.release(actor_id, &stream).await;
            return Err(e.into());
        }
        Ok(urls)
    }

    pub async fn restore_linked_urls(
        &self,
        location: Location,
        urls: Vec<LinkedUrl>,
    ) -> Result<Vec<LinkedUrl>> {
        self.options.save(urls_key(location), &urls).await?;
        Ok(urls)
    }

    // ---- 托管文件 ----

    pub async fn get_managed_files(&self) -> Result<Vec<ManagedFile>> {
        Ok(self.options.load_or_default(MANAGED_FILES_KEY).await?)
    }

    pub async fn get_managed_file(&self, id: &str) -> Result<ManagedFile> {
        self.get_managed_files()
            .await?
            .into_iter()
            .find(|f| f.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("managed file {}", id)))
    }

    /// 读取托管文件的磁盘内容
    pub fn read_content(&self, file: &ManagedFile) -> Result<String> {
        let bytes = self
            .storage
            .read(&file.filename)
            .map_err(|e| ServiceError::WriteFailed(format!("cannot read {}: {}", file.filename, e)))?;
        String::from_utf8(bytes)
            .map_err(|e| ServiceError::InvalidContent(format!("{} is not valid UTF-8: {}", file.filename, e)))
    }

    /// 创建（`id` 为None）或更新托管文件
    ///
    /// 更新时提交空内容即删除。
    pub async fn set_managed_file(
        &self,
        actor_id: u64,
        id: Option<&str>,
        fields: ManagedFileFields,
    ) -> Result<FileWrite> {
        let files = self.get_managed_files().await?;
        let index = match id {
            Some(id) => Some(
                files
                    .iter()
                    .position(|f| f.id == id)
                    .ok_or_else(|| ServiceError::NotFound(format!("managed file {}", id)))?,
            ),
            None => None,
        };

        if fields.content.trim().is_empty() {
            return match index {
                Some(index) => {
                    let (file, content) = self.remove_at(actor_id, files, index).await?;
                    Ok(FileWrite::Deleted { file, content })
                }
                None => Err(ServiceError::InvalidContent("file content is empty".to_string())),
            };
        }

        let validated = self.validator.validate_file(fields.content.as_bytes())?;
        match index {
            None => self.create_file(actor_id, files, fields, validated.content, validated.warnings).await,
            Some(index) => {
                self.update_file(actor_id, files, index, fields, validated.content, validated.warnings)
                    .await
            }
        }
    }

    async fn create_file(
        &self,
        actor_id: u64,
        mut files: Vec<ManagedFile>,
        fields: ManagedFileFields,
        content: String,
        warnings: Vec<String>,
    ) -> Result<FileWrite> {
        let label = fields.label.trim().to_string();
        if label.is_empty() {
            return Err(ServiceError::InvalidFilename("a label is required".to_string()));
        }
        let requested = match fields.filename.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => sanitize_filename(name)?,
            _ => filename_from_label(&label)?,
        };
        let id = self.free_file_id(&label, &files).await?;
        let filename = unique_filename(&requested, |name| {
            self.storage.exists(name) || files.iter().any(|f| f.filename == name)
        });

        let stream = StreamKey::file(&id);
        self.acquire(actor_id, &stream).await?;

        if let Err(e) = self.storage.save(&filename, content.as_bytes()) {
            self.release(actor_id, &stream).await;
            return Err(ServiceError::WriteFailed(format!("cannot write {}: {}", filename, e)));
        }

        let now = Utc::now();
        let file = ManagedFile {
            id,
            label,
            filename,
            location: fields.location,
            conditions: fields.conditions.unwrap_or_default(),
            enabled: fields.enabled.unwrap_or(true),
            version: content_version(&content),
            created_at: now,
            updated_at: now,
        };
        files.push(file.clone());
        if let Err(e) = self.options.save(MANAGED_FILES_KEY, &files).await {
            // 元数据未落盘，新文件成为孤儿
            if let Err(cleanup) = self.storage.delete(&file.filename) {
                warn!(filename = %file.filename, error = %cleanup, "Failed to remove orphaned file");
            }
            self.release(actor_id, &stream).await;
            return Err(e.into());
        }

        info!(stream = %stream, actor = actor_id, filename = %file.filename, "Managed file created");
        Ok(FileWrite::Saved {
            file,
            content,
            created: true,
            warnings,
        })
    }

    async fn update_file(
        &self,
        actor_id: u64,
        mut files: Vec<ManagedFile>,
        index: usize,
        fields: ManagedFileFields,
        content: String,
        warnings: Vec<String>,
    ) -> Result<FileWrite> {
        let current = files[index].clone();
        let label = match fields.label.trim() {
            "" => current.label.clone(),
            label => label.to_string(),
        };
        let filename = match fields.filename.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                let requested = sanitize_filename(name)?;
                if requested == current.filename {
                    requested
                } else {
                    unique_filename(&requested, |name| {
                        name != current.filename
                            && (self.storage.exists(name) || files.iter().any(|f| f.filename == name))
                    })
                }
            }
            _ => current.filename.clone(),
        };
        let renamed = filename != current.filename;

        let stream = StreamKey::file(&current.id);
        self.acquire(actor_id, &stream).await?;

        let previous_content = if renamed {
            None
        } else {
            self.storage.read(&current.filename).ok()
        };
        if let Err(e) = self.storage.save(&filename, content.as_bytes()) {
            self.release(actor_id, &stream).await;
            return Err(ServiceError::WriteFailed(format!("cannot write {}: {}", filename, e)));
        }

        let file = ManagedFile {
            label,
            filename,
            location: fields.location,
            conditions: fields.conditions.unwrap_or_else(|| current.conditions.clone()),
            enabled: fields.enabled.unwrap_or(current.enabled),
            version: content_version(&content),
            updated_at: Utc::now(),
            ..current.clone()
        };
        files[index] = file.clone();
        if let Err(e) = self.options.save(MANAGED_FILES_KEY, &files).await {
            let rollback = match (&previous_content, renamed) {
                (_, true) => self.storage.delete(&file.filename),
                (Some(previous), false) => self.storage.save(&file.filename, previous),
                (None, false) => Ok(()),
            };
            if let Err(cleanup) = rollback {
                warn!(filename = %file.filename, error = %cleanup, "Failed to undo file write");
            }
            self.release(actor_id, &stream).await;
            return Err(e.into());
        }

        if renamed {
            // 新文件和元数据都已落盘后才删除旧文件
            if let Err(e) = self.storage.delete(&current.filename) {
                warn!(filename = %current.filename, error = %e, "Failed to remove renamed file");
            }
        }

        info!(stream = %stream, actor = actor_id, filename = %file.filename, renamed, "Managed file updated");
        Ok(FileWrite::Saved {
            file,
            content,
            created: false,
            warnings,
        })
    }

    /// 删除托管文件，返回被删除的元数据和内容
    pub async fn delete_managed_file(&self, actor_id: u64, id: &str) -> Result<(ManagedFile, String)> {
        let files = self.get_managed_files().await?;
        let index = files
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("managed file {}", id)))?;
        self.remove_at(actor_id, files, index).await
    }

    async fn remove_at(
        &self,
        actor_id: u64,
        mut files: Vec<ManagedFile>,
        index: usize,
    ) -> Result<(ManagedFile, String)> {
        let file = files.remove(index);
        let stream = StreamKey::file(&file.id);
        self.acquire(actor_id, &stream).await?;

        // 丢失的磁盘文件仍允许删除元数据
        let content = match self.read_content(&file) {
            Ok(content) => content,
            Err(e) => {
                warn!(filename = %file.filename, error = %e, "Deleting managed file without readable content");
                String::new()
            }
        };

        if let Err(e) = self.storage.delete(&file.filename) {
            self.release(actor_id, &stream).await;
            return Err(ServiceError::WriteFailed(format!("cannot delete {}: {}", file.filename, e)));
        }
        if let Err(e) = self.options.save(MANAGED_FILES_KEY, &files).await {
            if let Err(restore) = self.storage.save(&file.filename, content.as_bytes()) {
                warn!(filename = %file.filename, error = %restore, "Failed to restore deleted file");
            }
            self.release(actor_id, &stream).await;
            return Err(e.into());
        }

        info!(stream = %stream, actor = actor_id, filename = %file.filename, "Managed file deleted");
        Ok((file, content))
    }

    /// 可信恢复托管文件
    ///
    /// 元数据不存在时重新创建（恢复已删除的文件）；文件名被其它文件占用时追加数字后缀。
    pub async fn restore_managed_file(&self, snapshot: ManagedFile, content: String) -> Result<ManagedFile> {
        let mut files = self.get_managed_files().await?;
        let index = files.iter().position(|f| f.id == snapshot.id);
        let previous_filename = index.map(|i| files[i].filename.clone());

        let filename = unique_filename(&snapshot.filename, |name| {
            files.iter().any(|f| f.filename == name && f.id != snapshot.id)
                || (previous_filename.as_deref() != Some(name)
                    && name != snapshot.filename
                    && self.storage.exists(name))
        });

        self.storage
            .save(&filename, content.as_bytes())
            .map_err(|e| ServiceError::WriteFailed(format!("cannot write {}: {}", filename, e)))?;

        let file = ManagedFile {
            filename,
            version: content_version(&content),
            updated_at: Utc::now(),
            ..snapshot
        };
        match index {
            Some(i) => files[i] = file.clone(),
            None => files.push(file.clone()),
        }
        if let Err(e) = self.options.save(MANAGED_FILES_KEY, &files).await {
            if previous_filename.as_deref() != Some(file.filename.as_str()) {
                if let Err(cleanup) = self.storage.delete(&file.filename) {
                    warn!(filename = %file.filename, error = %cleanup, "Failed to remove restored file");
                }
            }
            return Err(e.into());
        }

        if let Some(previous) = previous_filename.filter(|p| *p != file.filename) {
            if let Err(e) = self.storage.delete(&previous) {
                warn!(filename = %previous, error = %e, "Failed to remove superseded file");
            }
        }
        Ok(file)
    }

    /// 为新文件选择id
    ///
    /// 已删除文件的历史流仍然保留，其id不能复用，否则两个文件会共用一个历史流。
    async fn free_file_id(&self, label: &str, files: &[ManagedFile]) -> Result<String> {
        let mut retired: Vec<String> = Vec::new();
        loop {
            let live = files.iter().map(|f| f.id.as_str());
            let id = unique_id(label, live.chain(retired.iter().map(String::as_str)));
            let history: Vec<HistoryEntry> = self
                .options
                .load_or_default(&StreamKey::file(&id).storage_key())
                .await?;
            if history.is_empty() {
                return Ok(id);
            }
            debug!(id = %id, "File id still owns history, skipping");
            retired.push(id);
        }
    }

    // ---- 限流门 ----

    async fn acquire(&self, actor_id: u64, stream: &StreamKey) -> Result<()> {
        let key = stream.to_string();
        match self
            .rate_limiter
            .try_acquire(actor_id, &key)
            .await
            .map_err(|e| ServiceError::Backend(e.to_string()))?
        {
            Acquire::Granted => Ok(()),
            Acquire::Limited { retry_after } => {
                info!(stream = %stream, actor = actor_id, retry_after, "Write rate limited");
                Err(ServiceError::RateLimited { retry_after })
            }
        }
    }

    /// 写入失败时释放限流门
    async fn release(&self, actor_id: u64, stream: &StreamKey) {
        if let Err(e) = self.rate_limiter.reset(actor_id, &stream.to_string()).await {
            warn!(stream = %stream, actor = actor_id, error = %e, "Failed to release write gate");
        }
    }
}

fn script_key(location: Location) -> &'static str {
    match location {
        Location::Head => HEAD_SCRIPT_KEY,
        Location::Footer => FOOTER_SCRIPT_KEY,
    }
}

fn urls_key(location: Location) -> &'static str {
    match location {
        Location::Head => HEAD_URLS_KEY,
        Location::Footer => FOOTER_URLS_KEY,
    }
}

/// 内容哈希的前12位，用作缓存版本号
pub fn content_version(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)[..12].to_string()
}
