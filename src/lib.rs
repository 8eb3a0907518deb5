use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod lock;
pub mod logging;
pub mod remote;
pub mod storage;

#[cfg(test)]
mod testing;

pub use crate::core::{SyncEngine, SyncOutcome, SyncReport};
pub use config::{JsonSettingsStore, Settings, SettingsStore};
pub use error::{SyncError, SyncResult};

use lock::SyncLock;
use remote::github::GitHubRemote;
use storage::local::LocalStorage;

/// 同步期间持有的引擎，释放后才能开始下一次同步
pub struct EngineGuard {
    engine: SyncEngine,
    _in_flight: OwnedMutexGuard<()>,
    _lock: SyncLock,
}

impl Deref for EngineGuard {
    type Target = SyncEngine;

    fn deref(&self) -> &SyncEngine {
        &self.engine
    }
}

impl DerefMut for EngineGuard {
    fn deref_mut(&mut self) -> &mut SyncEngine {
        &mut self.engine
    }
}

/// 应用状态，在各命令间共享
#[derive(Clone)]
pub struct AppState {
    pub config_dir: PathBuf,
    store: Arc<JsonSettingsStore>,
    in_flight: Arc<Mutex<()>>,
}

/// 确定配置目录：命令行指定优先，其次默认目录中的 `data_path`
pub fn resolve_config_dir(override_dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = override_dir {
        std::fs::create_dir_all(&dir)?;
        return Ok(dir);
    }

    let default_config_dir = dirs::config_dir()
        .map(|p| p.join("gitvault"))
        .unwrap_or_else(|| PathBuf::from(".gitvault"));

    std::fs::create_dir_all(&default_config_dir)?;

    let config_file = default_config_dir.join(config::SETTINGS_FILE);
    let config_dir = std::fs::read_to_string(&config_file)
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .and_then(|config| config.get("dataPath")?.as_str().map(PathBuf::from))
        .filter(|p| p.exists() && p.is_dir())
        .inspect(|p| tracing::debug!("使用自定义数据路径: {:?}", p))
        .unwrap_or(default_config_dir);

    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

impl AppState {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            store: Arc::new(JsonSettingsStore::new(config_dir)),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn load_settings(&self) -> SyncResult<Settings> {
        self.store.load()
    }

    pub fn settings_path(&self) -> &Path {
        self.store.path()
    }

    /// 先占进程内的锁，再占配置目录的文件锁
    fn acquire(&self) -> SyncResult<(OwnedMutexGuard<()>, SyncLock)> {
        let in_flight = self
            .in_flight
            .clone()
            .try_lock_owned()
            .map_err(|_| SyncError::SyncInProgress)?;
        let lock = SyncLock::try_acquire(&self.config_dir)?;
        Ok((in_flight, lock))
    }

    /// 取得同步引擎，已有同步（包括其它进程）正在进行时返回 `SyncInProgress`
    ///
    /// 每次都按磁盘上的设置重建，其它进程保存的缓存不会被旧副本覆盖。
    pub fn engine(&self) -> SyncResult<EngineGuard> {
        let (in_flight, lock) = self.acquire()?;
        let engine = self.build_engine()?;
        Ok(EngineGuard {
            engine,
            _in_flight: in_flight,
            _lock: lock,
        })
    }

    /// 修改并立即保存设置，与同步互斥
    pub fn update_settings<F>(&self, edit: F) -> SyncResult<Settings>
    where
        F: FnOnce(&mut Settings) -> SyncResult<()>,
    {
        let _guards = self.acquire()?;

        let mut settings = self.store.load()?;
        edit(&mut settings)?;
        self.store.save(&settings)?;
        Ok(settings)
    }

    fn build_engine(&self) -> SyncResult<SyncEngine> {
        let settings = self.store.load()?;
        settings.validate()?;

        let vault_path = match &settings.vault_path {
            Some(path) => PathBuf::from(path),
            None => std::env::current_dir().map_err(|e| SyncError::local(".", e))?,
        };
        let storage = LocalStorage::new(&vault_path)
            .map_err(|e| SyncError::local(vault_path.display().to_string(), format!("{:#}", e)))?;

        let remote = GitHubRemote::new(
            &settings.api_base,
            &settings.owner,
            &settings.repo,
            &settings.token,
            settings.committer.clone(),
        )?;

        tracing::debug!("创建同步引擎: {}/{} <-> {:?}", settings.owner, settings.repo, vault_path);
        Ok(SyncEngine::new(
            Arc::new(remote),
            Arc::new(storage),
            self.store.clone(),
            settings,
        ))
    }
}

pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            // Linux
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        }
    }
}
