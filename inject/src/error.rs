use thiserror::Error;

#[derive(Error, Debug)]
pub enum InjectError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] inject_api::StoreError),

    #[error("Service error: {0}")]
    Service(#[from] inject_service::ServiceError),

    #[error("Invalid IP allow-list: {0}")]
    IpAllowList(#[from] inject_infra::IpAllowListError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for InjectError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        InjectError::Internal(err.to_string())
    }
}

impl From<String> for InjectError {
    fn from(err: String) -> Self {
        InjectError::Internal(err)
    }
}

pub type Result<T> = std::result::Result<T, InjectError>;
