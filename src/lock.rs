//! 跨进程的同步锁
//!
//! 每个命令都是独立进程，进程内的 Mutex 挡不住另一个终端里的同步。
//! 锁文件放在配置目录，持有期间其它进程的同步和设置修改都会失败。

use crate::error::{SyncError, SyncResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

pub const LOCK_FILE: &str = "gitvault.lock";

/// 独占锁，drop 时释放
#[derive(Debug)]
pub struct SyncLock {
    file: File,
}

impl SyncLock {
    /// 尝试加锁，不等待；已被占用时返回 `SyncInProgress`
    pub fn try_acquire(config_dir: &Path) -> SyncResult<Self> {
        let path = config_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| SyncError::local(path.display().to_string(), e))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file }),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                tracing::warn!("{:?} 已被其它进程锁定", path);
                Err(SyncError::SyncInProgress)
            }
            Err(e) => Err(SyncError::local(path.display().to_string(), e)),
        }
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_lock_is_rejected_until_release() {
        let dir = tempfile::tempdir().unwrap();

        let first = SyncLock::try_acquire(dir.path()).unwrap();
        let err = SyncLock::try_acquire(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::SyncInProgress));

        drop(first);
        assert!(SyncLock::try_acquire(dir.path()).is_ok());
        assert!(dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn test_missing_config_dir_is_a_local_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SyncLock::try_acquire(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, SyncError::LocalStorage { .. }));
    }
}
