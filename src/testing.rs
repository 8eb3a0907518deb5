//! 测试用的内存实现

use crate::config::{Settings, SettingsStore};
use crate::error::{SyncError, SyncResult};
use crate::remote::{
    decode_content, encode_content, BlobPayload, CommitSummary, EntryKind, RemoteRepository,
    TreeEntry,
};
use crate::storage::{parent_dir, ExcludeRules, VaultStorage};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn fake_sha(content: &[u8]) -> String {
    blake3::hash(content).to_hex()[..12].to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOp {
    CreateDir(String),
    Write(String),
}

/// 内存笔记库
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    dirs: Mutex<BTreeSet<String>>,
    ops: Mutex<Vec<LocalOp>>,
    fail_write: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let storage = Self::default();
        for (path, content) in files {
            storage.put(path, content.as_bytes());
        }
        storage
    }

    pub fn put(&self, path: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn ops(&self) -> Vec<LocalOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn fail_writes_to(&self, path: &str) {
        *self.fail_write.lock().unwrap() = Some(path.to_string());
    }
}

#[async_trait]
impl VaultStorage for MemoryStorage {
    async fn list_files(&self, exclude: &ExcludeRules) -> Result<Vec<String>> {
        Ok(self
            .paths()
            .into_iter()
            .filter(|p| !exclude.excludes_path(p))
            .collect())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.get(path).ok_or_else(|| anyhow!("文件不存在: {}", path))
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        if self.fail_write.lock().unwrap().as_deref() == Some(path) {
            return Err(anyhow!("磁盘已满"));
        }
        if let Some(parent) = parent_dir(path) {
            if !self.dirs.lock().unwrap().contains(parent) {
                return Err(anyhow!("目录不存在: {}", parent));
            }
        }
        self.ops.lock().unwrap().push(LocalOp::Write(path.to_string()));
        self.put(path, &data);
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        self.ops
            .lock()
            .unwrap()
            .push(LocalOp::CreateDir(path.to_string()));
        let mut dirs = self.dirs.lock().unwrap();
        let mut current = String::new();
        for segment in path.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            dirs.insert(current.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    Create(String),
    Update { path: String, sha: String },
    Delete { path: String, sha: String },
}

#[derive(Default)]
struct FakeState {
    files: BTreeMap<String, String>,
    blobs: BTreeMap<String, Vec<u8>>,
    commits: usize,
    blob_fetches: Vec<String>,
    ops: Vec<RemoteOp>,
    unavailable: bool,
}

/// 内存远程仓库，行为与 REST 内容接口一致：写操作校验 sha
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let remote = Self::default();
        for (path, content) in files {
            remote.set_file(path, content.as_bytes());
        }
        remote
    }

    /// 模拟其它客户端直接修改远程
    pub fn set_file(&self, path: &str, content: &[u8]) -> String {
        let mut state = self.state.lock().unwrap();
        let sha = fake_sha(content);
        state.blobs.insert(sha.clone(), content.to_vec());
        state.files.insert(path.to_string(), sha.clone());
        state.commits += 1;
        sha
    }

    pub fn sha_of(&self, path: &str) -> Option<String> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn content_of(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let sha = state.files.get(path)?;
        state.blobs.get(sha).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().files.keys().cloned().collect()
    }

    pub fn blob_fetches(&self) -> Vec<String> {
        self.state.lock().unwrap().blob_fetches.clone()
    }

    pub fn ops(&self) -> Vec<RemoteOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn reset_log(&self) {
        let mut state = self.state.lock().unwrap();
        state.ops.clear();
        state.blob_fetches.clear();
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    fn check_available(state: &FakeState) -> SyncResult<()> {
        if state.unavailable {
            return Err(SyncError::RemoteUnavailable("503 Service Unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteRepository for FakeRemote {
    async fn latest_commit(&self) -> SyncResult<String> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        if state.commits == 0 {
            return Err(SyncError::EmptyRepository);
        }
        Ok(format!("commit-{}", state.commits))
    }

    async fn get_tree(&self, _commit: &str) -> SyncResult<Vec<TreeEntry>> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;

        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for (path, sha) in &state.files {
            let mut current = path.as_str();
            while let Some(parent) = parent_dir(current) {
                dirs.insert(parent.to_string());
                current = parent;
            }
            entries.push(TreeEntry {
                path: path.clone(),
                kind: EntryKind::Blob,
                sha: sha.clone(),
                locator: sha.clone(),
            });
        }
        for dir in dirs {
            entries.push(TreeEntry {
                path: dir.clone(),
                kind: EntryKind::Tree,
                sha: format!("tree-{}", dir),
                locator: String::new(),
            });
        }
        Ok(entries)
    }

    async fn get_blob(&self, locator: &str) -> SyncResult<BlobPayload> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        state.blob_fetches.push(locator.to_string());
        let content = state
            .blobs
            .get(locator)
            .ok_or_else(|| SyncError::RemoteUnavailable(format!("404 blob {}", locator)))?;
        Ok(BlobPayload {
            sha: locator.to_string(),
            content_base64: encode_content(content),
        })
    }

    async fn put_content(
        &self,
        path: &str,
        content_base64: &str,
        _message: &str,
        existing_sha: Option<&str>,
    ) -> SyncResult<String> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        let current = state.files.get(path).cloned();
        if current.as_deref() != existing_sha {
            return Err(SyncError::ConcurrencyConflict {
                path: path.to_string(),
            });
        }

        let content = decode_content(path, content_base64)?;
        let sha = fake_sha(&content);
        state.blobs.insert(sha.clone(), content);
        state.files.insert(path.to_string(), sha.clone());
        state.commits += 1;
        let op = match existing_sha {
            None => RemoteOp::Create(path.to_string()),
            Some(old) => RemoteOp::Update {
                path: path.to_string(),
                sha: old.to_string(),
            },
        };
        state.ops.push(op);
        Ok(sha)
    }

    async fn delete_content(
        &self,
        path: &str,
        _message: &str,
        existing_sha: &str,
    ) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        if state.files.get(path).map(String::as_str) != Some(existing_sha) {
            return Err(SyncError::ConcurrencyConflict {
                path: path.to_string(),
            });
        }
        state.files.remove(path);
        state.commits += 1;
        state.ops.push(RemoteOp::Delete {
            path: path.to_string(),
            sha: existing_sha.to_string(),
        });
        Ok(())
    }

    async fn create_blob(&self, content_base64: &str) -> SyncResult<String> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        let content = decode_content("blob", content_base64)?;
        let sha = fake_sha(&content);
        state.blobs.insert(sha.clone(), content);
        Ok(sha)
    }

    async fn list_commits(&self, limit: u32) -> SyncResult<Vec<CommitSummary>> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok((1..=state.commits)
            .rev()
            .take(limit as usize)
            .map(|n| CommitSummary {
                sha: format!("commit-{}", n),
                message: format!("change {}", n),
                author: None,
                date: None,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// 内存设置存储，记录保存次数
#[derive(Default)]
pub struct MemorySettingsStore {
    saved: Mutex<Option<Settings>>,
    saves: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Option<Settings> {
        self.saved.lock().unwrap().clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> SyncResult<Settings> {
        Ok(self.snapshot().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> SyncResult<()> {
        *self.saved.lock().unwrap() = Some(settings.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
