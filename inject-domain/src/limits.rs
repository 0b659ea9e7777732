use serde::{Deserialize, Serialize};

/// 存储与历史的上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// 每个位置流保留的历史条数
    pub max_history: usize,
    /// 统一活动日志保留的条数
    pub max_log_entries: usize,
    /// 内联脚本和URL列表的最大字节数
    pub max_content_bytes: usize,
    /// 托管文件的最大字节数
    pub max_file_bytes: usize,
    /// 同一操作者在同一流上两次保存的最小间隔（秒）
    pub rate_limit_seconds: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_history: 10,
            max_log_entries: 100,
            max_content_bytes: 100 * 1024,
            max_file_bytes: 2 * 1024 * 1024,
            rate_limit_seconds: 10,
        }
    }
}
