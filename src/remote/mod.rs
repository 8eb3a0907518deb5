pub mod github;

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

pub use github::GitHubRemote;

/// 树条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// 子模块等其它条目
    #[serde(other)]
    Other,
}

/// 远程树列表中的一个条目（内容尚未获取）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub sha: String,
    /// 获取 blob 内容的地址
    #[serde(rename = "url", default)]
    pub locator: String,
}

/// blob 内容（传输编码为 base64）
#[derive(Debug, Clone)]
pub struct BlobPayload {
    pub sha: String,
    pub content_base64: String,
}

/// 提交摘要
#[derive(Debug, Clone, Serialize)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    pub author: Option<String>,
    pub date: Option<String>,
}

/// 提交者信息，不设置时由远程使用 token 对应的用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

/// 远程仓库服务接口
///
/// 所有调用都由同步流程顺序 await，实现不需要处理并发。
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// 默认分支最新提交；没有任何提交时返回 `EmptyRepository`
    async fn latest_commit(&self) -> SyncResult<String>;

    /// 递归列出某个提交的文件树
    async fn get_tree(&self, commit: &str) -> SyncResult<Vec<TreeEntry>>;

    /// 获取 blob 内容
    async fn get_blob(&self, locator: &str) -> SyncResult<BlobPayload>;

    /// 创建（`existing_sha` 为空）或更新文件，返回新的 content hash
    async fn put_content(
        &self,
        path: &str,
        content_base64: &str,
        message: &str,
        existing_sha: Option<&str>,
    ) -> SyncResult<String>;

    /// 删除文件，`existing_sha` 过期时返回 `ConcurrencyConflict`
    async fn delete_content(&self, path: &str, message: &str, existing_sha: &str)
        -> SyncResult<()>;

    /// 创建 blob 对象，返回其 hash
    async fn create_blob(&self, content_base64: &str) -> SyncResult<String>;

    /// 最近的提交
    async fn list_commits(&self, limit: u32) -> SyncResult<Vec<CommitSummary>>;

    /// 仓库名称（用于日志）
    fn name(&self) -> &str;
}

/// 编码为传输格式
pub fn encode_content(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// 解码传输格式，远程返回的 base64 每 60 个字符带一个换行
pub fn decode_content(path: &str, encoded: &str) -> SyncResult<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| SyncError::RemoteUnavailable(format!("{} 的内容无法解码: {}", path, e)))
}
