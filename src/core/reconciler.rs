//! 本地与远程文件集合的差异计算和执行
//!
//! Pull：远程为准，逐个写入本地，不删除本地独有的文件。
//! Push：本地为准，创建/更新/删除远程文件，使远程文件集合与本地完全一致。

use crate::core::cache::{CacheStore, RemoteFile};
use crate::core::resolver::RemoteFileSet;
use crate::error::{SyncError, SyncResult};
use crate::remote::{encode_content, RemoteRepository};
use crate::storage::{parent_dir, LocalFile, VaultStorage};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// 推送动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushAction {
    /// 远程没有该路径
    Create { path: String },
    /// 内容不同，用旧 hash 作为并发令牌
    Update { path: String, sha: String },
    /// 内容相同
    Unchanged { path: String },
    /// 只存在于远程
    Delete { path: String, sha: String },
}

impl PushAction {
    pub fn path(&self) -> &str {
        match self {
            PushAction::Create { path }
            | PushAction::Update { path, .. }
            | PushAction::Unchanged { path }
            | PushAction::Delete { path, .. } => path,
        }
    }
}

/// 动作统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionSummary {
    pub create_count: usize,
    pub update_count: usize,
    pub unchanged_count: usize,
    pub delete_count: usize,
}

impl ActionSummary {
    pub fn from_actions(actions: &[PushAction]) -> Self {
        let mut summary = Self::default();
        for action in actions {
            summary.record(action);
        }
        summary
    }

    fn record(&mut self, action: &PushAction) {
        match action {
            PushAction::Create { .. } => self.create_count += 1,
            PushAction::Update { .. } => self.update_count += 1,
            PushAction::Unchanged { .. } => self.unchanged_count += 1,
            PushAction::Delete { .. } => self.delete_count += 1,
        }
    }

    /// 需要写远程的动作数
    pub fn changes(&self) -> usize {
        self.create_count + self.update_count + self.delete_count
    }

    /// 所有本地文件都与远程相同，且远程没有多余文件
    pub fn is_fully_synced(&self) -> bool {
        self.changes() == 0
    }
}

/// 计算推送动作
///
/// 每个本地文件匹配到的远程文件从工作副本中移除，剩下的就是只存在于远程、需要删除的文件。
/// 内容按字节比较。
pub fn plan_push(local: &[LocalFile], remote: &RemoteFileSet) -> Vec<PushAction> {
    let mut remaining: BTreeMap<&str, &RemoteFile> =
        remote.iter().map(|(path, file)| (path.as_str(), file)).collect();
    let mut actions = Vec::with_capacity(local.len() + remote.len());

    for file in local {
        let action = match remaining.remove(file.path.as_str()) {
            None => PushAction::Create {
                path: file.path.clone(),
            },
            Some(existing) if existing.content == file.content => PushAction::Unchanged {
                path: file.path.clone(),
            },
            Some(existing) => PushAction::Update {
                path: file.path.clone(),
                sha: existing.sha.clone(),
            },
        };
        actions.push(action);
    }

    actions.extend(remaining.into_values().map(|file| PushAction::Delete {
        path: file.path.clone(),
        sha: file.sha.clone(),
    }));

    actions
}

fn commit_message(action: &PushAction) -> String {
    match action {
        PushAction::Create { path } => format!("Created file: {}", path),
        PushAction::Update { path, .. } => format!("Updated file: {}", path),
        PushAction::Delete { path, .. } => format!("Deleted file: {}", path),
        PushAction::Unchanged { path } => format!("Unchanged file: {}", path),
    }
}

/// 顺序执行推送动作，任何失败立即中止
///
/// 创建/更新成功后把新 hash 和上传的内容写入缓存，下一次解析可以直接复用。
pub async fn apply_push(
    actions: &[PushAction],
    local: &[LocalFile],
    remote: &dyn RemoteRepository,
    cache: &mut dyn CacheStore,
) -> SyncResult<ActionSummary> {
    let contents: BTreeMap<&str, &[u8]> = local
        .iter()
        .map(|f| (f.path.as_str(), f.content.as_slice()))
        .collect();
    let mut applied = ActionSummary::default();

    for action in actions {
        match action {
            PushAction::Unchanged { .. } => {}
            PushAction::Create { path } | PushAction::Update { path, .. } => {
                let content = contents.get(path.as_str()).copied().ok_or_else(|| {
                    SyncError::local(path.as_str(), "文件不在本次扫描结果中")
                })?;
                let existing_sha = match action {
                    PushAction::Update { sha, .. } => Some(sha.as_str()),
                    _ => None,
                };

                debug!("上传 {} ({} 字节)", path, content.len());
                let new_sha = remote
                    .put_content(
                        path,
                        &encode_content(content),
                        &commit_message(action),
                        existing_sha,
                    )
                    .await?;

                cache.upsert(RemoteFile {
                    path: path.clone(),
                    sha: new_sha,
                    content: content.to_vec(),
                });
                cache.persist()?;
            }
            PushAction::Delete { path, sha } => {
                debug!("删除远程文件 {}", path);
                remote
                    .delete_content(path, &commit_message(action), sha)
                    .await?;
            }
        }
        applied.record(action);
    }

    info!(
        "推送完成: 创建 {}, 更新 {}, 删除 {}, 相同 {}",
        applied.create_count, applied.update_count, applied.delete_count, applied.unchanged_count
    );
    Ok(applied)
}

/// 把远程文件逐个写入本地，父目录先于文件创建。返回写入的文件数
pub async fn apply_pull(remote: &RemoteFileSet, storage: &dyn VaultStorage) -> SyncResult<usize> {
    let mut written = 0;

    for file in remote.values() {
        if let Some(parent) = parent_dir(&file.path) {
            storage
                .create_dir(parent)
                .await
                .map_err(|e| SyncError::local(parent, format!("{:#}", e)))?;
        }

        debug!("写入 {} ({} 字节)", file.path, file.content.len());
        storage
            .write(&file.path, file.content.clone())
            .await
            .map_err(|e| SyncError::local(file.path.as_str(), format!("{:#}", e)))?;
        written += 1;
    }

    info!("拉取完成: 写入 {} 个文件", written);
    Ok(written)
}
