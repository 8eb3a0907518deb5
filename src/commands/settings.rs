//! 设置查看/修改命令

use crate::config::Settings;
use crate::error::SyncError;
use crate::remote::Committer;
use crate::AppState;
use anyhow::Result;
use serde::Serialize;

/// 展示用的设置（令牌已脱敏）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub config_file: String,
    pub owner: String,
    pub repo: String,
    pub token: String,
    pub vault_path: Option<String>,
    pub api_base: String,
    pub exclude_dirs: Vec<String>,
    pub committer: Option<String>,
    pub cached_files: usize,
}

impl SettingsView {
    fn new(state: &AppState, settings: &Settings) -> Self {
        Self {
            config_file: state.settings_path().display().to_string(),
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
            token: settings.masked_token(),
            vault_path: settings.vault_path.clone(),
            api_base: settings.api_base.clone(),
            exclude_dirs: settings.exclude_dirs.clone(),
            committer: settings
                .committer
                .as_ref()
                .map(|c| format!("{} <{}>", c.name, c.email)),
            cached_files: settings.cache.len(),
        }
    }
}

/// 要修改的字段，`None` 表示保持不变
#[derive(Debug, Default)]
pub struct SettingsPatch {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub vault_path: Option<String>,
    pub api_base: Option<String>,
    /// 非空时整体替换排除目录
    pub exclude_dirs: Vec<String>,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
}

impl SettingsPatch {
    fn apply(self, settings: &mut Settings) -> Result<(), SyncError> {
        if let Some(owner) = self.owner {
            settings.owner = owner.trim().to_string();
        }
        if let Some(repo) = self.repo {
            settings.repo = repo.trim().to_string();
        }
        if let Some(token) = self.token {
            settings.token = token.trim().to_string();
        }
        if let Some(vault) = self.vault_path {
            settings.vault_path = Some(vault).filter(|v| !v.trim().is_empty());
        }
        if let Some(api_base) = self.api_base {
            settings.api_base = api_base.trim().trim_end_matches('/').to_string();
        }
        if !self.exclude_dirs.is_empty() {
            let mut dirs: Vec<String> = self
                .exclude_dirs
                .into_iter()
                .map(|d| d.trim().trim_matches('/').to_string())
                .filter(|d| !d.is_empty())
                .collect();
            dirs.sort();
            dirs.dedup();
            settings.exclude_dirs = dirs;
        }

        match (self.committer_name, self.committer_email) {
            (None, None) => {}
            (Some(name), Some(email)) => settings.committer = Some(Committer { name, email }),
            (name, email) => {
                // 只改一半时沿用原来的另一半
                let current = settings.committer.clone();
                let name = name.or_else(|| current.as_ref().map(|c| c.name.clone()));
                let email = email.or_else(|| current.as_ref().map(|c| c.email.clone()));
                match (name, email) {
                    (Some(name), Some(email)) => settings.committer = Some(Committer { name, email }),
                    _ => {
                        return Err(SyncError::Settings(
                            "提交者需要同时设置名称和邮箱".to_string(),
                        ))
                    }
                }
            }
        }

        // 仓库变化后旧缓存不再有效
        if settings.bind_cache() {
            tracing::info!("仓库已变更，清除远程文件缓存");
        }
        Ok(())
    }
}

/// 查看设置
pub fn show_settings(state: &AppState) -> Result<SettingsView> {
    let settings = state.load_settings()?;
    Ok(SettingsView::new(state, &settings))
}

/// 修改设置并立即保存
pub fn set_settings(state: &AppState, patch: SettingsPatch) -> Result<SettingsView> {
    let settings = state.update_settings(|settings| patch.apply(settings))?;
    Ok(SettingsView::new(state, &settings))
}
