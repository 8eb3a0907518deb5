//! 同步错误类型

use thiserror::Error;

/// 同步过程中的错误
///
/// 除 `EmptyRepository` 外，所有错误都会中止当前同步，已写入/已缓存的文件保留原样，
/// 重新执行同步即可继续。
#[derive(Debug, Error)]
pub enum SyncError {
    /// 远程仓库还没有任何提交，视为"远程没有文件"
    #[error("远程仓库为空")]
    EmptyRepository,

    /// 网络、认证、限流等远程失败
    #[error("远程仓库不可用: {0}")]
    RemoteUnavailable(String),

    /// 提交的 content hash 已过期（远程在解析之后被修改）
    #[error("并发冲突: {path} 在远程已被修改，请重新同步")]
    ConcurrencyConflict { path: String },

    /// 本地目录创建或文件读写失败
    #[error("本地存储失败 ({path}): {message}")]
    LocalStorage { path: String, message: String },

    /// 设置加载/保存失败
    #[error("设置错误: {0}")]
    Settings(String),

    /// 已有同步正在进行
    #[error("已有同步任务正在进行")]
    SyncInProgress,
}

impl SyncError {
    pub fn local(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SyncError::LocalStorage {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// 失败提示只区分"可能是空仓库"和其他失败
    pub fn is_empty_repository(&self) -> bool {
        matches!(self, SyncError::EmptyRepository)
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_error_keeps_path() {
        let err = SyncError::local("docs/a.md", "permission denied");
        match &err {
            SyncError::LocalStorage { path, message } => {
                assert_eq!(path, "docs/a.md");
                assert_eq!(message, "permission denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("docs/a.md"));
    }

    #[test]
    fn test_is_empty_repository() {
        assert!(SyncError::EmptyRepository.is_empty_repository());
        assert!(!SyncError::RemoteUnavailable("500".into()).is_empty_repository());
    }
}
