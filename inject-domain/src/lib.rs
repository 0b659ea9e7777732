pub mod account;
pub mod artifact;
pub mod condition;
pub mod history;
pub mod limits;

pub use account::{Account, ApplicationPassword};
pub use artifact::{InlineScript, LinkedUrl, Location, ManagedFile, ParseLocationError};
pub use condition::{Logic, Rule, RuleSet};
pub use history::{HistoryAction, HistoryEntry, ParseStreamKeyError, Snapshot, StreamKey};
pub use limits::Limits;

/// 选项存储中使用的键
pub mod constant {
    pub const HEAD_SCRIPT_KEY: &str = "inject_head_script";
    pub const FOOTER_SCRIPT_KEY: &str = "inject_footer_script";
    pub const HEAD_URLS_KEY: &str = "inject_head_urls";
    pub const FOOTER_URLS_KEY: &str = "inject_footer_urls";
    pub const MANAGED_FILES_KEY: &str = "inject_managed_files";
    pub const ACCOUNTS_KEY: &str = "inject_accounts";

    /// 历史记录键前缀，后接流键
    pub const HISTORY_KEY_PREFIX: &str = "inject_history:";
}
