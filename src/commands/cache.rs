//! 缓存相关命令

use crate::AppState;
use anyhow::Result;

/// 清空远程文件缓存，返回清除的条目数
///
/// 不需要仓库设置完整，只与正在进行的同步互斥。
pub fn clear_cache(state: &AppState) -> Result<usize> {
    let mut cleared = 0;
    state.update_settings(|settings| {
        cleared = settings.clear_cache();
        Ok(())
    })?;
    tracing::info!("已清除 {} 个缓存条目", cleared);
    Ok(cleared)
}
