//! 提交记录

use crate::remote::CommitSummary;
use crate::AppState;
use anyhow::Result;

pub const DEFAULT_LIMIT: u32 = 10;

/// 默认分支最近的提交
pub async fn recent_commits(state: &AppState, limit: u32) -> Result<Vec<CommitSummary>> {
    let engine = state.engine()?;
    let commits = engine.recent_commits(limit.clamp(1, 100)).await?;
    Ok(commits)
}

/// 单行展示：短 hash、日期、首行提交信息
pub fn format_commit(commit: &CommitSummary) -> String {
    let short: String = commit.sha.chars().take(7).collect();
    let title = commit.message.lines().next().unwrap_or_default();
    match (&commit.date, &commit.author) {
        (Some(date), Some(author)) => format!("{} {} {} ({})", short, date, title, author),
        (Some(date), None) => format!("{} {} {}", short, date, title),
        _ => format!("{} {}", short, title),
    }
}
