use inject_api::StoreError;
use serde::Serialize;
use thiserror::Error;

/// 核心服务错误
///
/// 每个变体对应一个稳定的错误码和HTTP状态，由 [`ServiceError::to_body`]
/// 渲染为结构化错误体。
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("content is too large: {actual} bytes exceeds the {max} byte limit")]
    TooLarge { max: usize, actual: usize },

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid conditions: {0}")]
    InvalidRuleSet(String),

    #[error("invalid stream: {0}")]
    InvalidStream(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("too many saves, retry in {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("index 0 is the current state, nothing to restore")]
    CurrentState,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("backend error: {0}")]
    Backend(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::TooLarge { .. } => "too_large",
            ServiceError::InvalidContent(_) => "invalid_content",
            ServiceError::InvalidFilename(_) => "invalid_filename",
            ServiceError::InvalidUrl(_) => "invalid_url",
            ServiceError::InvalidRuleSet(_) => "invalid_conditions",
            ServiceError::InvalidStream(_) => "invalid_stream",
            ServiceError::WriteFailed(_) => "write_failed",
            ServiceError::RateLimited { .. } => "rate_limited",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::CurrentState => "current_state",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::PermissionDenied(_) => "permission_denied",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::Backend(_) => "backend_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::TooLarge { .. } => 413,
            ServiceError::InvalidContent(_)
            | ServiceError::InvalidFilename(_)
            | ServiceError::InvalidUrl(_)
            | ServiceError::InvalidRuleSet(_)
            | ServiceError::InvalidStream(_) => 400,
            ServiceError::RateLimited { .. } => 429,
            ServiceError::NotFound(_) => 404,
            ServiceError::CurrentState | ServiceError::Conflict(_) => 409,
            ServiceError::PermissionDenied(_) => 403,
            ServiceError::WriteFailed(_) | ServiceError::Storage(_) | ServiceError::Backend(_) => 500,
        }
    }

    /// 是否为校验类错误（写入被拒绝，状态不变）
    pub fn is_validation(&self) -> bool {
        self.http_status() == 400 || self.http_status() == 413
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            http_status: self.http_status(),
            retry_after: match self {
                ServiceError::RateLimited { retry_after } => Some(*retry_after),
                _ => None,
            },
        }
    }
}

/// 结构化错误体
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(rename = "httpStatus")]
    pub http_status: u16,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
