pub mod local;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

pub use local::LocalStorage;

/// 本地文件（每次同步时重新扫描）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: String,
    pub content: Vec<u8>,
}

/// 目录排除规则
///
/// 按路径段精确匹配目录名，`my-git-sync-notes` 不会因为包含 `git-sync` 被排除。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeRules {
    dir_names: BTreeSet<String>,
}

impl ExcludeRules {
    pub fn new<I, S>(dir_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dir_names: dir_names
                .into_iter()
                .map(Into::into)
                .map(|name: String| name.trim_matches('/').to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// 目录名是否被排除
    pub fn excludes_dir(&self, name: &str) -> bool {
        self.dir_names.contains(name)
    }

    /// 文件路径的任一目录段被排除时返回 true
    pub fn excludes_path(&self, path: &str) -> bool {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        // 最后一段是文件名
        segments.pop();
        segments.iter().any(|segment| self.excludes_dir(segment))
    }

    pub fn dir_names(&self) -> impl Iterator<Item = &str> {
        self.dir_names.iter().map(String::as_str)
    }
}

/// 本地存储接口
#[async_trait]
pub trait VaultStorage: Send + Sync {
    /// 递归列出所有文件的相对路径（使用 `/` 分隔），跳过被排除的目录
    async fn list_files(&self, exclude: &ExcludeRules) -> Result<Vec<String>>;

    /// 读取整个文件
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// 写入整个文件（覆盖）
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// 创建目录，目录已存在不算错误
    async fn create_dir(&self, path: &str) -> Result<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 文件路径的父目录，根目录下的文件返回 None
pub fn parent_dir(path: &str) -> Option<&str> {
    path.rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}
