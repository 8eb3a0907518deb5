use super::{ExcludeRules, VaultStorage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

const TEMP_SUFFIX: &str = ".gitvault-tmp";

/// 本地文件夹（笔记库根目录）
pub struct LocalStorage {
    base_path: PathBuf,
    name: String,
}

impl LocalStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)
                .with_context(|| format!("无法创建目录 {:?}", base_path))?;
        }
        let name = format!("local:{}", base_path.display());
        Ok(Self { base_path, name })
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = path.trim_start_matches('/').trim_start_matches('\\');
        if path.is_empty() {
            self.base_path.clone()
        } else {
            self.base_path.join(path)
        }
    }

    /// 规范化路径分隔符（统一使用 /）
    fn normalize_path(path: &str) -> String {
        path.replace('\\', "/")
    }

    /// 同目录下的临时文件名，不会与其它文件的扩展名冲突
    fn temp_path(full_path: &Path) -> PathBuf {
        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        full_path.with_file_name(format!(".{}{}", file_name, TEMP_SUFFIX))
    }

    /// 中断的写入留下的临时文件
    fn is_temp_file(name: &str) -> bool {
        name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
    }
}

#[async_trait]
impl VaultStorage for LocalStorage {
    async fn list_files(&self, exclude: &ExcludeRules) -> Result<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let base_path = self.base_path.clone();
        let exclude = exclude.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let files = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut files = Vec::new();
            let walker = WalkDir::new(&base_path)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| {
                    // 根目录本身不参与排除
                    entry.depth() == 0
                        || !entry.file_type().is_dir()
                        || !exclude.excludes_dir(&entry.file_name().to_string_lossy())
                });

            for entry in walker {
                let entry = entry.context("遍历目录失败")?;
                if !entry.file_type().is_file() || Self::is_temp_file(&entry.file_name().to_string_lossy()) {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&base_path)
                    .with_context(|| format!("路径不在库目录内: {:?}", entry.path()))?;
                files.push(Self::normalize_path(&relative.to_string_lossy()));
            }
            files.sort();
            Ok(files)
        })
        .await??;

        Ok(files)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.resolve_path(path))
            .await
            .with_context(|| format!("读取 {} 失败", path))?;
        Ok(data)
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let full_path = self.resolve_path(path);

        // 使用临时文件写入，然后原子重命名
        let temp_path = Self::temp_path(&full_path);
        fs::write(&temp_path, data)
            .await
            .with_context(|| format!("写入 {} 失败", path))?;
        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            // 临时文件不能留在库里，否则下次推送会把它上传
            let _ = fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| format!("替换 {} 失败", path));
        }

        Ok(())
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::create_dir_all(&full_path)
            .await
            .with_context(|| format!("创建目录 {} 失败", path))?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_files_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("notes/sub")).unwrap();
        std::fs::create_dir_all(root.join(".git/objects")).unwrap();
        std::fs::create_dir_all(root.join("my-git-sync-notes")).unwrap();
        std::fs::write(root.join("a.md"), "a").unwrap();
        std::fs::write(root.join("notes/sub/b.md"), "b").unwrap();
        std::fs::write(root.join(".git/objects/x"), "x").unwrap();
        std::fs::write(root.join("my-git-sync-notes/c.md"), "c").unwrap();

        let storage = LocalStorage::new(root).unwrap();
        let rules = ExcludeRules::new([".git", "git-sync"]);
        let files = storage.list_files(&rules).await.unwrap();

        assert_eq!(files, vec!["a.md", "my-git-sync-notes/c.md", "notes/sub/b.md"]);
    }

    #[tokio::test]
    async fn test_write_overwrites_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();

        storage.create_dir("docs").await.unwrap();
        storage.write("docs/a.md", b"one".to_vec()).await.unwrap();
        storage.write("docs/a.md", b"two".to_vec()).await.unwrap();

        assert_eq!(storage.read("docs/a.md").await.unwrap(), b"two");
        let files = storage.list_files(&ExcludeRules::default()).await.unwrap();
        assert_eq!(files, vec!["docs/a.md"]);
    }

    #[tokio::test]
    async fn test_failed_replace_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        storage.create_dir("docs").await.unwrap();

        // 目标是已存在的目录，重命名会失败
        assert!(storage.write("docs", b"x".to_vec()).await.is_err());

        assert!(!dir.path().join(".docs.gitvault-tmp").exists());
        let files = storage.list_files(&ExcludeRules::default()).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_list_files_skips_leftover_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join(".a.md.gitvault-tmp"), "partial").unwrap();

        let storage = LocalStorage::new(dir.path()).unwrap();
        let files = storage.list_files(&ExcludeRules::default()).await.unwrap();
        assert_eq!(files, vec!["a.md"]);
    }

    #[tokio::test]
    async fn test_create_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();

        storage.create_dir("a/b").await.unwrap();
        storage.create_dir("a/b").await.unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let err = storage.read("missing.md").await.unwrap_err();
        assert!(format!("{:#}", err).contains("missing.md"));
    }
}
