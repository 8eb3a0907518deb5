//! 应用设置
//!
//! 所有设置（远程仓库、令牌、排除目录、日志、远程文件缓存）保存在一个 JSON 文件里，
//! 整体加载、整体保存。

use crate::core::cache::{repo_fingerprint, RemoteFileCache};
use crate::error::{SyncError, SyncResult};
use crate::logging::LogConfig;
use crate::remote::github::DEFAULT_API_BASE;
use crate::remote::Committer;
use crate::storage::ExcludeRules;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "config.json";

/// 默认排除的目录：版本库元数据、依赖目录、本工具自身目录、回收站
pub fn default_exclude_dirs() -> Vec<String> {
    [".git", "node_modules", ".gitvault", ".trash"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

/// 设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// 仓库所有者
    pub owner: String,
    /// 仓库名
    pub repo: String,
    /// 访问令牌
    pub token: String,
    /// 本地笔记库路径，未设置时使用当前目录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_path: Option<String>,
    pub api_base: String,
    pub exclude_dirs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer: Option<Committer>,
    /// 自定义数据目录（只在默认配置目录中生效）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
    pub log: LogConfig,
    pub cache: RemoteFileCache,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            token: String::new(),
            vault_path: None,
            api_base: default_api_base(),
            exclude_dirs: default_exclude_dirs(),
            committer: None,
            data_path: None,
            log: LogConfig::default(),
            cache: RemoteFileCache::default(),
        }
    }
}

impl Settings {
    /// 同步前检查必填项
    pub fn validate(&self) -> SyncResult<()> {
        if self.owner.trim().is_empty() {
            return Err(SyncError::Settings("未设置仓库所有者 (owner)".to_string()));
        }
        if self.repo.trim().is_empty() {
            return Err(SyncError::Settings("未设置仓库名 (repo)".to_string()));
        }
        Ok(())
    }

    pub fn exclude_rules(&self) -> ExcludeRules {
        ExcludeRules::new(self.exclude_dirs.iter().cloned())
    }

    pub fn fingerprint(&self) -> String {
        repo_fingerprint(&self.api_base, &self.owner, &self.repo)
    }

    /// 缓存与当前仓库不匹配时清空，返回是否清除了缓存
    pub fn bind_cache(&mut self) -> bool {
        let fingerprint = self.fingerprint();
        self.cache.bind_to(&fingerprint)
    }

    /// 清空远程文件缓存，返回清除的条目数
    pub fn clear_cache(&mut self) -> usize {
        let count = self.cache.len();
        self.cache.clear();
        count
    }

    /// 用于展示的令牌（只保留末尾 4 位）
    pub fn masked_token(&self) -> String {
        let count = self.token.chars().count();
        if count == 0 {
            return "(未设置)".to_string();
        }
        if count <= 4 {
            return "*".repeat(count);
        }
        let tail: String = self.token.chars().skip(count - 4).collect();
        format!("{}{}", "*".repeat(count - 4), tail)
    }
}

/// 设置的加载/保存
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> SyncResult<Settings>;

    /// 整体保存，对调用方是原子的
    fn save(&self, settings: &Settings) -> SyncResult<()>;
}

/// 保存为 JSON 文件
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(SETTINGS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> SyncResult<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| SyncError::Settings(format!("读取 {:?} 失败: {}", self.path, e)))?;
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_json::from_str(&content)
            .map_err(|e| SyncError::Settings(format!("解析 {:?} 失败: {}", self.path, e)))
    }

    fn save(&self, settings: &Settings) -> SyncResult<()> {
        let data = serde_json::to_vec_pretty(settings)
            .map_err(|e| SyncError::Settings(format!("序列化设置失败: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::local(parent.display().to_string(), e))?;
        }

        // 先写临时文件再重命名
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, data)
            .map_err(|e| SyncError::local(temp_path.display().to_string(), e))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| SyncError::local(self.path.display().to_string(), e))?;
        Ok(())
    }
}
