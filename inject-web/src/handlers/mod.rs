pub mod activity;
pub mod files;
pub mod health;
pub mod scripts;
pub mod urls;

pub use activity::*;
pub use files::*;
pub use health::*;
pub use scripts::*;
pub use urls::*;

use crate::error::ApiError;
use inject_domain::Location;
use serde::Deserialize;

/// 回滚请求体
#[derive(Debug, Deserialize)]
pub struct RollbackBody {
    pub index: usize,
}

/// 解析路径中的位置参数
pub(crate) fn parse_location(raw: &str) -> Result<Location, ApiError> {
    raw.parse()
        .map_err(|e: inject_domain::ParseLocationError| ApiError::bad_request("invalid_location", e.to_string()))
}
