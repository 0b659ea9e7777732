use super::ScriptStorage;
use anyhow::{bail, Result};
use std::path::PathBuf;

/// 本地目录存储实现
pub struct LocalScriptStorage {
    base_path: PathBuf,
}

impl LocalScriptStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// 构建完整文件路径，拒绝跳出存储目录的名称
    fn build_path(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename == "."
            || filename == ".."
        {
            bail!("invalid storage filename: {:?}", filename);
        }
        Ok(self.base_path.join(filename))
    }
}

impl ScriptStorage for LocalScriptStorage {
    fn save(&self, filename: &str, content: &[u8]) -> Result<()> {
        let full_path = self.build_path(filename)?;
        std::fs::create_dir_all(&self.base_path)?;

        // 先写临时文件再改名，避免留下半个文件
        let tmp_path = self.base_path.join(format!(".{}.tmp", filename));
        std::fs::write(&tmp_path, content)?;
        if let Err(e) = std::fs::rename(&tmp_path, &full_path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let full_path = self.build_path(filename)?;
        Ok(std::fs::read(&full_path)?)
    }

    fn delete(&self, filename: &str) -> Result<()> {
        let full_path = self.build_path(filename)?;
        if full_path.exists() {
            std::fs::remove_file(&full_path)?;
        }
        Ok(())
    }

    fn exists(&self, filename: &str) -> bool {
        self.build_path(filename)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalScriptStorage::new(dir.path().join("scripts"));

        assert!(!storage.exists("tracker.js"));
        storage.save("tracker.js", b"track();").unwrap();
        assert!(storage.exists("tracker.js"));
        assert_eq!(storage.read("tracker.js").unwrap(), b"track();");

        storage.save("tracker.js", b"track(2);").unwrap();
        assert_eq!(storage.read("tracker.js").unwrap(), b"track(2);");

        storage.delete("tracker.js").unwrap();
        assert!(!storage.exists("tracker.js"));
        storage.delete("tracker.js").unwrap();
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalScriptStorage::new(dir.path().to_path_buf());

        assert!(storage.save("../escape.js", b"x").is_err());
        assert!(storage.save("..", b"x").is_err());
        assert!(storage.read("sub/dir.js").is_err());
        assert!(!storage.exists("..\\win.js"));
    }
}
