use crate::error::{SyncError, SyncResult};
use crate::storage::{ExcludeRules, LocalFile, VaultStorage};
use tracing::{debug, info};

/// 本地文件集合（按路径排序）
pub type LocalFileSet = Vec<LocalFile>;

/// 文件扫描器
pub struct FileScanner {
    exclude: ExcludeRules,
}

impl FileScanner {
    pub fn new(exclude: ExcludeRules) -> Self {
        Self { exclude }
    }

    /// 扫描存储并读取所有文件内容
    pub async fn scan(&self, storage: &dyn VaultStorage) -> SyncResult<LocalFileSet> {
        info!("开始扫描存储: {}", storage.name());

        let paths = storage
            .list_files(&self.exclude)
            .await
            .map_err(|e| SyncError::local(storage.name(), format!("{:#}", e)))?;

        let mut files = Vec::with_capacity(paths.len());
        let mut excluded_count = 0;

        for path in paths {
            // 存储实现不一定在遍历时剪枝
            if self.exclude.excludes_path(&path) {
                debug!("排除文件: {}", path);
                excluded_count += 1;
                continue;
            }

            let content = storage
                .read(&path)
                .await
                .map_err(|e| SyncError::local(path.as_str(), format!("{:#}", e)))?;
            files.push(LocalFile { path, content });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);

        info!("扫描完成: {} 个文件, {} 个被排除", files.len(), excluded_count);
        Ok(files)
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new(ExcludeRules::new(crate::config::default_exclude_dirs()))
    }
}
