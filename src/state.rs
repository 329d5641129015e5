//! Shared state behind the server and the CLI.
//!
//! Loaded index files are cached by path and checked against an xxh3 digest
//! of the file on every lookup, so an edited file is rebuilt. Concurrent
//! requests for the same build await one shared future.

use crate::config::{SearchConfig, expand_tilde};
use crate::error::LoadError;
use crate::index::{LoadedIndex, content_digest, parse_index_file};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lru::LruCache;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Build future that several callers can await.
type SharedLoad = Shared<BoxFuture<'static, Result<Arc<LoadedIndex>, String>>>;

/// Identifies one search so a caller can tell whether a newer one started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryTicket(u64);

pub struct IndexState {
    config: SearchConfig,
    cache: RwLock<LruCache<PathBuf, Arc<LoadedIndex>>>,
    /// Builds in progress, keyed by path and content digest.
    in_flight: Mutex<HashMap<(PathBuf, u64), SharedLoad>>,
    /// Index selected with `load_index`; falls back to the configured one.
    active: RwLock<Option<PathBuf>>,
    last_ticket: AtomicU64,
}

impl std::fmt::Debug for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexState")
            .field("config", &self.config)
            .field("cached", &self.cache.try_read().map(|c| c.len()).ok())
            .field("last_ticket", &self.last_ticket.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl IndexState {
    pub fn new(config: SearchConfig) -> Self {
        let capacity = config.cache_capacity();
        Self {
            config,
            cache: RwLock::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            active: RwLock::new(None),
            last_ticket: AtomicU64::new(0),
        }
    }

    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Returns the index built from `path`, building it if the cache has no
    /// entry for the file's current contents.
    pub async fn load(&self, path: &Path) -> Result<Arc<LoadedIndex>, String> {
        let path = normalize(path);
        let bytes = tokio::fs::read(&path).await.map_err(|source| {
            LoadError::Io {
                path: path.clone(),
                source,
            }
            .to_string()
        })?;
        let digest = content_digest(&bytes);

        {
            let mut cache = self.cache.write().await;
            if let Some(loaded) = cache.get(&path) {
                if loaded.digest == digest {
                    tracing::debug!(path = %path.display(), "index cache hit");
                    return Ok(Arc::clone(loaded));
                }
                tracing::info!(path = %path.display(), "index file changed, rebuilding");
                cache.pop(&path);
            }
        }

        let key = (path.clone(), digest);
        let (future, started) = {
            let mut in_flight = self.in_flight.lock().await;
            // a build may have finished since the first lookup
            if let Some(loaded) = self.cache.write().await.get(&path)
                && loaded.digest == digest
            {
                return Ok(Arc::clone(loaded));
            }
            if let Some(future) = in_flight.get(&key) {
                (future.clone(), false)
            } else {
                let future = build(path.clone(), bytes);
                in_flight.insert(key.clone(), future.clone());
                (future, true)
            }
        };

        if !started {
            tracing::debug!(path = %path.display(), "awaiting in-flight index build");
            return future.await;
        }

        tracing::info!(path = %path.display(), "building search index");
        let result = future.await;
        if let Ok(loaded) = &result {
            self.cache.write().await.put(path, Arc::clone(loaded));
        }
        self.in_flight.lock().await.remove(&key);
        result
    }

    /// Loads `path` and makes it the index searched by default.
    pub async fn activate(&self, path: &Path) -> Result<Arc<LoadedIndex>, String> {
        let loaded = self.load(path).await?;
        *self.active.write().await = Some(loaded.path.clone());
        Ok(loaded)
    }

    /// The active index, or the configured one when none was activated.
    pub async fn active(&self) -> Result<Arc<LoadedIndex>, String> {
        let selected = self.active.read().await.clone();
        let path = selected
            .or_else(|| self.config.index_path.clone())
            .ok_or_else(|| {
                "No index loaded. Use load_index with the path of a search index file, \
                 or set index_path in the configuration."
                    .to_string()
            })?;
        self.load(&path).await
    }

    pub async fn is_cached(&self, path: &Path) -> bool {
        self.cache.read().await.contains(&normalize(path))
    }

    /// Starts a new logical query, superseding every earlier ticket.
    pub fn begin_query(&self) -> QueryTicket {
        QueryTicket(self.last_ticket.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether no query began after `ticket`.
    pub fn is_current(&self, ticket: QueryTicket) -> bool {
        self.last_ticket.load(Ordering::SeqCst) == ticket.0
    }
}

fn normalize(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(text) => PathBuf::from(expand_tilde(text).into_owned()),
        None => path.to_path_buf(),
    }
}

fn build(path: PathBuf, bytes: Vec<u8>) -> SharedLoad {
    let future: BoxFuture<'static, Result<Arc<LoadedIndex>, String>> = Box::pin(async move {
        tokio::task::spawn_blocking(move || parse_index_file(&path, &bytes))
            .await
            .map_err(|e| format!("index build task failed: {e}"))?
            .map(Arc::new)
            .map_err(|e| e.to_string())
    });
    future.shared()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const ONE_CRATE: &str = r#"{"crates": [["demo", {"t": "H", "n": ["run"], "q": [[0, "demo"]], "i": [0], "D": "d", "f": "`"}]]}"#;
    const TWO_CRATES: &str = r#"{"crates": [["demo", {"t": "", "D": "b"}], ["other", {"t": "", "D": "b"}]]}"#;

    struct Files {
        dir: TempDir,
        path: PathBuf,
    }

    #[fixture]
    fn files() -> Files {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("index.json");
        std::fs::write(&path, ONE_CRATE).expect("write index");
        Files { dir, path }
    }

    #[rstest]
    #[tokio::test]
    async fn cache_hit_returns_the_same_build(files: Files) {
        let state = IndexState::new(SearchConfig::default());
        let_assert!(Ok(first) = state.load(&files.path).await);
        let_assert!(Ok(second) = state.load(&files.path).await);
        check!(Arc::ptr_eq(&first, &second));
        check!(state.is_cached(&files.path).await);
    }

    #[rstest]
    #[tokio::test]
    async fn edited_file_is_rebuilt(files: Files) {
        let state = IndexState::new(SearchConfig::default());
        let_assert!(Ok(first) = state.load(&files.path).await);
        let_assert!(Ok(()) = std::fs::write(&files.path, TWO_CRATES));
        let_assert!(Ok(second) = state.load(&files.path).await);
        check!(first.digest != second.digest);
        check!(second.index.crates().len() == 2);
    }

    #[rstest]
    #[tokio::test]
    async fn concurrent_loads_share_one_build(files: Files) {
        let state = IndexState::new(SearchConfig::default());
        let (a, b) = futures::join!(state.load(&files.path), state.load(&files.path));
        let_assert!(Ok(a) = a);
        let_assert!(Ok(b) = b);
        check!(Arc::ptr_eq(&a, &b));
    }

    #[rstest]
    #[tokio::test]
    async fn active_index_falls_back_to_config(files: Files) {
        let state = IndexState::new(SearchConfig::default());
        let_assert!(Err(e) = state.active().await);
        check!(e.contains("No index loaded"));

        let config = SearchConfig {
            index_path: Some(files.path.clone()),
            ..SearchConfig::default()
        };
        let state = IndexState::new(config);
        let_assert!(Ok(loaded) = state.active().await);
        check!(loaded.path == files.path);

        let other = files.dir.path().join("other.json");
        let_assert!(Ok(()) = std::fs::write(&other, TWO_CRATES));
        let_assert!(Ok(_) = state.activate(&other).await);
        let_assert!(Ok(loaded) = state.active().await);
        check!(loaded.path == other);
    }

    #[rstest]
    #[tokio::test]
    async fn load_errors_are_reported(files: Files) {
        let state = IndexState::new(SearchConfig::default());
        let_assert!(Err(e) = state.load(&files.dir.path().join("missing.json")).await);
        check!(e.contains("failed to read search index"));

        let_assert!(Ok(()) = std::fs::write(&files.path, "not json"));
        let_assert!(Err(e) = state.load(&files.path).await);
        check!(e.contains("failed to parse search index"));
        check!(!state.is_cached(&files.path).await);
    }

    #[test]
    fn newer_tickets_supersede_older_ones() {
        let state = IndexState::new(SearchConfig::default());
        let first = state.begin_query();
        check!(state.is_current(first));
        let second = state.begin_query();
        check!(second > first);
        check!(!state.is_current(first));
        check!(state.is_current(second));
    }
}
