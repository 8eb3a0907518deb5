use crate::config::{Settings, SettingsStore};
use crate::core::cache::PersistentCache;
use crate::core::reconciler::{apply_pull, apply_push, plan_push, ActionSummary};
use crate::core::resolver::{ResolvedTree, TreeResolver};
use crate::core::scanner::FileScanner;
use crate::error::SyncResult;
use crate::remote::{CommitSummary, RemoteRepository};
use crate::storage::VaultStorage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// 同步方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Pull,
    Push,
}

/// 同步结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncOutcome {
    /// 两边完全一致，没有任何写操作
    FullySynced,
    /// 写入了更改
    ChangesApplied,
    /// 远程仓库为空（拉取时没有文件可写）
    RemoteEmpty,
}

impl SyncOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SyncOutcome::FullySynced => "已完全同步 👌",
            SyncOutcome::ChangesApplied => "已同步更改",
            SyncOutcome::RemoteEmpty => "远程仓库为空",
        }
    }
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    /// 推送的动作统计（拉取时为零）
    pub summary: ActionSummary,
    /// 拉取写入本地的文件数
    pub written: usize,
    pub blobs_fetched: usize,
    pub blobs_reused: usize,
    pub remote_empty: bool,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    fn new(direction: SyncDirection, started_at: DateTime<Utc>) -> Self {
        Self {
            direction,
            started_at,
            finished_at: started_at,
            duration_ms: 0,
            summary: ActionSummary::default(),
            written: 0,
            blobs_fetched: 0,
            blobs_reused: 0,
            remote_empty: false,
            outcome: SyncOutcome::FullySynced,
        }
    }

    fn finish(mut self, outcome: SyncOutcome) -> Self {
        self.finished_at = Utc::now();
        self.duration_ms = (self.finished_at - self.started_at).num_milliseconds();
        self.outcome = outcome;
        self
    }
}

/// 同步引擎
///
/// 拥有设置（包括远程文件缓存）。`pull`/`push` 需要 `&mut self`，同一个引擎不会同时跑两次同步。
pub struct SyncEngine {
    remote: Arc<dyn RemoteRepository>,
    storage: Arc<dyn VaultStorage>,
    store: Arc<dyn SettingsStore>,
    settings: Settings,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteRepository>,
        storage: Arc<dyn VaultStorage>,
        store: Arc<dyn SettingsStore>,
        mut settings: Settings,
    ) -> Self {
        settings.bind_cache();
        Self {
            remote,
            storage,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// 解析远程文件树，空仓库视为没有文件
    async fn resolve_remote(&mut self) -> SyncResult<Option<ResolvedTree>> {
        let resolver = TreeResolver::new(self.remote.as_ref());
        let mut cache = PersistentCache::new(&mut self.settings, self.store.as_ref());

        match resolver.resolve(&mut cache).await {
            Ok(tree) => Ok(Some(tree)),
            Err(e) if e.is_empty_repository() => {
                info!("{} 还没有任何提交", self.remote.name());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// 拉取：远程为准写入本地，本地独有的文件保持不变
    pub async fn pull(&mut self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(SyncDirection::Pull, Utc::now());
        info!("开始拉取: {} -> {}", self.remote.name(), self.storage.name());

        let Some(tree) = self.resolve_remote().await? else {
            report.remote_empty = true;
            return Ok(report.finish(SyncOutcome::RemoteEmpty));
        };
        report.blobs_fetched = tree.fetched;
        report.blobs_reused = tree.reused;

        report.written = apply_pull(&tree.files, self.storage.as_ref()).await?;

        let outcome = if report.written > 0 {
            SyncOutcome::ChangesApplied
        } else {
            SyncOutcome::FullySynced
        };
        Ok(report.finish(outcome))
    }

    /// 推送：本地为准，远程最终与本地文件集合完全一致
    pub async fn push(&mut self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(SyncDirection::Push, Utc::now());
        info!("开始推送: {} -> {}", self.storage.name(), self.remote.name());

        let scanner = FileScanner::new(self.settings.exclude_rules());
        let local = scanner.scan(self.storage.as_ref()).await?;

        let tree = match self.resolve_remote().await? {
            Some(tree) => tree,
            None => {
                report.remote_empty = true;
                ResolvedTree::empty()
            }
        };
        report.blobs_fetched = tree.fetched;
        report.blobs_reused = tree.reused;

        let actions = plan_push(&local, &tree.files);
        let planned = ActionSummary::from_actions(&actions);
        info!(
            "差异: 创建 {}, 更新 {}, 删除 {}, 相同 {}",
            planned.create_count, planned.update_count, planned.delete_count, planned.unchanged_count
        );

        let mut cache = PersistentCache::new(&mut self.settings, self.store.as_ref());
        report.summary = apply_push(&actions, &local, self.remote.as_ref(), &mut cache).await?;

        let outcome = if report.summary.is_fully_synced() {
            SyncOutcome::FullySynced
        } else {
            SyncOutcome::ChangesApplied
        };
        Ok(report.finish(outcome))
    }

    /// 清空远程文件缓存并保存，返回清除的条目数
    pub fn clear_cache(&mut self) -> SyncResult<usize> {
        let count = self.settings.clear_cache();
        self.store.save(&self.settings)?;
        if count > 0 {
            info!("已清除 {} 个缓存条目", count);
        } else {
            warn!("缓存本来就是空的");
        }
        Ok(count)
    }

    /// 最近的提交
    pub async fn recent_commits(&self, limit: u32) -> SyncResult<Vec<CommitSummary>> {
        self.remote.list_commits(limit).await
    }
}
