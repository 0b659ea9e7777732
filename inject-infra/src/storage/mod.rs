pub mod local;

pub use local::LocalScriptStorage;

/// 托管脚本文件的磁盘存储trait
///
/// 文件名是存储目录内的扁平名称，不允许包含路径分隔符。
pub trait ScriptStorage: Send + Sync {
    /// 保存文件（整体替换）
    fn save(&self, filename: &str, content: &[u8]) -> anyhow::Result<()>;

    /// 读取文件
    fn read(&self, filename: &str) -> anyhow::Result<Vec<u8>>;

    /// 删除文件，不存在时不报错
    fn delete(&self, filename: &str) -> anyhow::Result<()>;

    /// 检查文件是否存在
    fn exists(&self, filename: &str) -> bool;
}
