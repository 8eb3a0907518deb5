pub mod cache;
pub mod engine;
pub mod reconciler;
pub mod resolver;
pub mod scanner;

pub use cache::{CacheStore, PersistentCache, RemoteFile, RemoteFileCache};
pub use engine::{SyncDirection, SyncEngine, SyncOutcome, SyncReport};
pub use reconciler::{apply_pull, apply_push, plan_push, ActionSummary, PushAction};
pub use resolver::{RemoteFileSet, ResolvedTree, TreeResolver};
pub use scanner::{FileScanner, LocalFileSet};
