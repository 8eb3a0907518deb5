//! 推送/拉取命令

use crate::core::{SyncDirection, SyncReport};
use crate::error::SyncError;
use crate::AppState;
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// 执行前的确认提示
pub fn confirm_message(direction: SyncDirection) -> &'static str {
    match direction {
        SyncDirection::Push => "推送会用本地笔记库覆盖远程仓库，远程独有的文件将被删除。继续吗？",
        SyncDirection::Pull => "拉取会用远程内容覆盖本地的同名文件，本地独有的文件保持不变。继续吗？",
    }
}

/// 读取一行回答，只有 y/yes 视为同意
pub fn confirm_with<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, prompt: &str) -> io::Result<bool> {
    write!(writer, "{} [y/N] ", prompt)?;
    writer.flush()?;

    let mut answer = String::new();
    reader.read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// 执行同步，用户取消时返回 `None`
pub async fn run_sync(
    state: &AppState,
    direction: SyncDirection,
    assume_yes: bool,
) -> Result<Option<SyncReport>> {
    if !assume_yes {
        let stdin = io::stdin();
        let confirmed = confirm_with(&mut stdin.lock(), &mut io::stderr(), confirm_message(direction))
            .context("读取确认输入失败")?;
        if !confirmed {
            tracing::info!("用户取消了同步");
            return Ok(None);
        }
    }

    let mut engine = state.engine()?;
    let report = match direction {
        SyncDirection::Push => engine.push().await?,
        SyncDirection::Pull => engine.pull().await?,
    };

    tracing::info!(
        "同步结束: {:?} {:?}, 耗时 {} ms",
        report.direction,
        report.outcome,
        report.duration_ms
    );
    Ok(Some(report))
}

/// 失败提示；空仓库在引擎里按"没有文件"处理，不会走到这里
pub fn describe_failure(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<SyncError>() {
        Some(SyncError::SyncInProgress) => "已有同步任务正在进行",
        Some(SyncError::ConcurrencyConflict { .. }) => "同步失败：远程在同步期间被修改，请重新同步",
        _ => "同步失败",
    }
}

/// 报告的单行摘要
pub fn summarize(report: &SyncReport) -> String {
    match report.direction {
        SyncDirection::Push => format!(
            "{}：创建 {}，更新 {}，删除 {}，未变 {}",
            report.outcome.message(),
            report.summary.create_count,
            report.summary.update_count,
            report.summary.delete_count,
            report.summary.unchanged_count
        ),
        SyncDirection::Pull => format!(
            "{}：写入 {} 个文件（下载 {}，缓存命中 {}）",
            report.outcome.message(),
            report.written,
            report.blobs_fetched,
            report.blobs_reused
        ),
    }
}
