//! 日志相关命令

use crate::error::SyncError;
use crate::logging::LogConfig;
use crate::AppState;
use anyhow::Result;

/// 获取日志配置
pub fn get_log_config(state: &AppState) -> LogConfig {
    LogConfig::load(&state.config_dir)
}

/// 设置日志配置，下次启动生效
pub fn set_log_config(
    state: &AppState,
    enabled: Option<bool>,
    max_size_mb: Option<u32>,
    level: Option<String>,
) -> Result<LogConfig> {
    let settings = state.update_settings(|settings| {
        if let Some(e) = enabled {
            settings.log.enabled = e;
        }
        if let Some(size) = max_size_mb {
            settings.log.set_max_size_mb(size);
        }
        if let Some(l) = level {
            settings.log.set_level(&l).map_err(SyncError::Settings)?;
        }
        Ok(())
    })?;

    Ok(settings.log)
}
