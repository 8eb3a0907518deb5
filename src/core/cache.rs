//! 远程文件缓存
//!
//! 记录每个路径最近一次从远程看到的内容和 content hash。hash 不变时直接复用缓存内容，
//! 避免每次同步都重新下载全部 blob。

use crate::config::{Settings, SettingsStore};
use crate::error::SyncResult;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// 远程文件（同时也是缓存条目）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub path: String,
    /// content hash，同时作为写操作的并发令牌
    pub sha: String,
    #[serde(with = "base64_content")]
    pub content: Vec<u8>,
}

pub type CachedFileEntry = RemoteFile;

/// 持久化时内容以 base64 保存
mod base64_content {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// 计算仓库指纹（用于判断设置是否指向了另一个仓库）
pub fn repo_fingerprint(api_base: &str, owner: &str, repo: &str) -> String {
    let key = format!("{}/{}/{}", api_base.trim_end_matches('/'), owner, repo);
    let hash = blake3::hash(key.as_bytes());
    hash.to_hex()[..16].to_string()
}

/// 路径 -> 缓存条目，纯内存操作
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileCache {
    #[serde(default)]
    fingerprint: String,
    #[serde(default)]
    files: BTreeMap<String, RemoteFile>,
}

impl RemoteFileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, path: &str) -> Option<&RemoteFile> {
        self.files.get(path)
    }

    pub fn upsert(&mut self, entry: RemoteFile) {
        self.files.insert(entry.path.clone(), entry);
    }

    /// 清空全部条目
    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// 绑定到仓库指纹；指纹变化时旧条目全部作废。返回是否清除了缓存
    pub fn bind_to(&mut self, fingerprint: &str) -> bool {
        if self.fingerprint == fingerprint {
            return false;
        }
        let dropped = !self.files.is_empty();
        if dropped {
            info!("缓存属于另一个仓库，清除 {} 个条目", self.files.len());
        }
        self.files.clear();
        self.fingerprint = fingerprint.to_string();
        dropped
    }
}

/// 树解析使用的缓存接口
pub trait CacheStore: Send {
    fn lookup(&self, path: &str) -> Option<&RemoteFile>;

    fn upsert(&mut self, entry: RemoteFile);

    fn clear(&mut self);

    /// 立即持久化，中断的同步不会丢失已完成的更新
    fn persist(&mut self) -> SyncResult<()>;
}

impl CacheStore for RemoteFileCache {
    fn lookup(&self, path: &str) -> Option<&RemoteFile> {
        RemoteFileCache::lookup(self, path)
    }

    fn upsert(&mut self, entry: RemoteFile) {
        RemoteFileCache::upsert(self, entry)
    }

    fn clear(&mut self) {
        RemoteFileCache::clear(self)
    }

    fn persist(&mut self) -> SyncResult<()> {
        Ok(())
    }
}

/// 保存在设置里的缓存，每次持久化写回整个设置对象
pub struct PersistentCache<'a> {
    settings: &'a mut Settings,
    store: &'a dyn SettingsStore,
}

impl<'a> PersistentCache<'a> {
    pub fn new(settings: &'a mut Settings, store: &'a dyn SettingsStore) -> Self {
        Self { settings, store }
    }
}

impl CacheStore for PersistentCache<'_> {
    fn lookup(&self, path: &str) -> Option<&RemoteFile> {
        self.settings.cache.lookup(path)
    }

    fn upsert(&mut self, entry: RemoteFile) {
        self.settings.cache.upsert(entry)
    }

    fn clear(&mut self) {
        self.settings.cache.clear()
    }

    fn persist(&mut self) -> SyncResult<()> {
        debug!("保存缓存 ({} 个条目)", self.settings.cache.len());
        self.store.save(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySettingsStore;

    fn entry(path: &str, sha: &str, content: &str) -> RemoteFile {
        RemoteFile {
            path: path.to_string(),
            sha: sha.to_string(),
            content: content.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_upsert_then_lookup() {
        let mut cache = RemoteFileCache::new();
        assert!(cache.lookup("a.md").is_none());

        cache.upsert(entry("a.md", "h1", "one"));
        cache.upsert(entry("a.md", "h2", "two"));

        let found = cache.lookup("a.md").unwrap();
        assert_eq!(found.sha, "h2");
        assert_eq!(found.content, b"two");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut cache = RemoteFileCache::new();
        cache.upsert(entry("a.md", "h1", "one"));
        cache.upsert(entry("b/c.md", "h2", "two"));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.lookup("b/c.md").is_none());
    }

    #[test]
    fn test_repo_fingerprint() {
        let a = repo_fingerprint("https://api.github.com/", "alice", "notes");
        let b = repo_fingerprint("https://api.github.com", "alice", "notes");
        let c = repo_fingerprint("https://api.github.com", "alice", "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_bind_to_other_repo_drops_entries() {
        let mut cache = RemoteFileCache::new();
        assert!(!cache.bind_to("fp1"));
        cache.upsert(entry("a.md", "h1", "one"));

        assert!(!cache.bind_to("fp1"));
        assert_eq!(cache.len(), 1);

        assert!(cache.bind_to("fp2"));
        assert!(cache.is_empty());
        assert_eq!(cache.fingerprint(), "fp2");
    }

    #[test]
    fn test_serialized_content_is_base64() {
        let mut cache = RemoteFileCache::new();
        cache.upsert(entry("a.md", "h1", "hi"));
        let json = serde_json::to_value(&cache).unwrap();
        assert_eq!(json["files"]["a.md"]["content"], "aGk=");

        let restored: RemoteFileCache = serde_json::from_value(json).unwrap();
        assert_eq!(restored, cache);
    }

    #[test]
    fn test_persistent_cache_saves_settings() {
        let store = MemorySettingsStore::default();
        let mut settings = Settings::default();
        {
            let mut cache = PersistentCache::new(&mut settings, &store);
            cache.upsert(entry("a.md", "h1", "one"));
            cache.persist().unwrap();
        }

        assert_eq!(store.save_count(), 1);
        let saved = store.snapshot().unwrap();
        assert_eq!(saved.cache.lookup("a.md").unwrap().sha, "h1");
    }
}
