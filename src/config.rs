//! Runtime configuration.
//!
//! Settings come from a TOML file (an explicit path, or
//! `<config dir>/rustdoc-search/config.toml` when present), then the
//! `RUSTDOC_SEARCH_INDEX` environment variable, then command-line flags.

use crate::error::Result;
use crate::search::SearchOptions;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Environment variable naming the index file to load.
pub const INDEX_PATH_ENV: &str = "RUSTDOC_SEARCH_INDEX";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Index file loaded at startup.
    pub index_path: Option<PathBuf>,
    /// Prefix of generated documentation links.
    pub root_path: String,
    /// Restrict searches to one crate.
    pub filter_crate: Option<String>,
    /// Crate whose items rank first.
    pub current_crate: Option<String>,
    /// Rows printed per result category.
    pub result_limit: usize,
    /// Loaded index files kept in memory.
    pub cache_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_path: None,
            root_path: "../".to_string(),
            filter_crate: None,
            current_crate: None,
            result_limit: 10,
            cache_size: 8,
        }
    }
}

impl SearchConfig {
    /// `<config dir>/rustdoc-search/config.toml`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rustdoc-search").join("config.toml"))
    }

    /// Loads the configuration and applies the environment override.
    ///
    /// An explicit path must exist; the default location is optional.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path).await?,
            None => match Self::default_path() {
                Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => {
                    Self::from_file(&path).await?
                }
                _ => Self::default(),
            },
        };
        Ok(config.with_index_override(std::env::var(INDEX_PATH_ENV).ok()))
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses TOML text, expanding `~` in the index path.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.index_path = config.index_path.map(|p| expand_path(&p));
        Ok(config)
    }

    /// Replaces the index path when `value` is set and non-empty.
    pub fn with_index_override(mut self, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.index_path = Some(PathBuf::from(expand_tilde(value.trim()).into_owned()));
        }
        self
    }

    pub fn cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.cache_size).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn search_options(&self) -> SearchOptions<'_> {
        SearchOptions {
            filter_crate: self.filter_crate.as_deref(),
            current_crate: self.current_crate.as_deref(),
            root_path: &self.root_path,
        }
    }
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(text) => PathBuf::from(expand_tilde(text).into_owned()),
        None => path.to_path_buf(),
    }
}

/// Expands a leading `~` to the home directory.
///
/// - `~/foo` becomes `/home/user/foo`
/// - `~` becomes `/home/user`
/// - Other paths are returned unchanged
pub fn expand_tilde(path: &str) -> Cow<'_, str> {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return Cow::Owned(home.join(stripped).display().to_string());
        }
    } else if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return Cow::Owned(home.display().to_string());
    }
    Cow::Borrowed(path)
}
