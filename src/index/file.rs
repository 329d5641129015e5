//! Index files on disk.

use super::builder::build_index;
use super::desc::ShardedDescriptions;
use super::raw::IndexFile;
use super::SearchIndex;
use crate::error::LoadError;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// A built index together with the descriptions it points into.
#[derive(Debug)]
pub struct LoadedIndex {
    pub path: PathBuf,
    /// xxh3 of the file contents the index was built from.
    pub digest: u64,
    pub index: SearchIndex,
    pub descriptions: ShardedDescriptions,
}

/// Content digest used to tell whether a cached build is still current.
pub fn content_digest(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

/// Parses an index file's bytes and builds the search index.
///
/// CPU-bound; async callers run it on a blocking thread.
pub fn parse_index_file(path: &Path, bytes: &[u8]) -> Result<LoadedIndex, LoadError> {
    let file: IndexFile = serde_json::from_slice(bytes).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let index = build_index(&file.crates)?;
    let descriptions = ShardedDescriptions::new(file.descriptions);
    Ok(LoadedIndex {
        path: path.to_path_buf(),
        digest: content_digest(bytes),
        index,
        descriptions,
    })
}

/// Reads and builds an index file synchronously.
pub fn read_index_file(path: &Path) -> Result<LoadedIndex, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_index_file(path, &bytes)
}
