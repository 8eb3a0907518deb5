//! 远程文件树解析
//!
//! 获取默认分支最新提交的文件树，结合缓存得到当前的远程文件集合。
//! 只有 hash 变化（或缓存中没有）的 blob 才会被下载，下载后立即写入缓存并持久化。

use crate::core::cache::{CacheStore, RemoteFile};
use crate::error::SyncResult;
use crate::remote::{decode_content, EntryKind, RemoteRepository};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// 远程文件集合（路径 -> 文件）
pub type RemoteFileSet = BTreeMap<String, RemoteFile>;

/// 解析结果
#[derive(Debug, Clone, Default)]
pub struct ResolvedTree {
    pub files: RemoteFileSet,
    /// 新下载的 blob 数
    pub fetched: usize,
    /// 直接复用缓存的 blob 数
    pub reused: usize,
}

impl ResolvedTree {
    /// 远程为空仓库时的结果
    pub fn empty() -> Self {
        Self::default()
    }
}

pub struct TreeResolver<'a> {
    remote: &'a dyn RemoteRepository,
}

impl<'a> TreeResolver<'a> {
    pub fn new(remote: &'a dyn RemoteRepository) -> Self {
        Self { remote }
    }

    /// 解析最新提交的文件树
    ///
    /// 仓库没有提交时返回 `EmptyRepository`，由调用方决定是否当作"零个文件"。
    pub async fn resolve(&self, cache: &mut dyn CacheStore) -> SyncResult<ResolvedTree> {
        let commit = self.remote.latest_commit().await?;
        info!("解析 {} 的文件树 (提交 {})", self.remote.name(), commit);

        let entries = self.remote.get_tree(&commit).await?;
        let mut resolved = ResolvedTree::default();

        for entry in entries {
            // 目录隐含在路径中
            if entry.kind != EntryKind::Blob {
                continue;
            }

            if let Some(cached) = cache.lookup(&entry.path) {
                if cached.sha == entry.sha {
                    resolved.reused += 1;
                    resolved.files.insert(entry.path.clone(), cached.clone());
                    continue;
                }
            }

            debug!("下载 {} ({})", entry.path, entry.sha);
            let blob = self.remote.get_blob(&entry.locator).await?;
            let content = decode_content(&entry.path, &blob.content_base64)?;
            let file = RemoteFile {
                path: entry.path.clone(),
                sha: entry.sha,
                content,
            };

            cache.upsert(file.clone());
            cache.persist()?;

            resolved.fetched += 1;
            resolved.files.insert(entry.path, file);
        }

        info!(
            "远程共 {} 个文件 (下载 {}, 缓存命中 {})",
            resolved.files.len(),
            resolved.fetched,
            resolved.reused
        );
        Ok(resolved)
    }
}
