//! Error handling types and utilities.

use std::path::PathBuf;

/// A specialized Result type for rustdoc-search application plumbing.
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` methods throughout the codebase.
pub type Result<T> = anyhow::Result<T>;

/// Structural damage found while decoding a crate's search payload.
///
/// These never come from user input. A well-formed payload produced by rustdoc
/// cannot trigger them, so they abort loading of the affected crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorruptIndex {
    #[error("encoded stream ended unexpectedly at offset {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("list opened at offset {offset} is never closed")]
    UnterminatedList { offset: usize },

    #[error("backreference {index} at offset {offset} reaches past the {len} cached values")]
    BadBackref {
        index: usize,
        offset: usize,
        len: usize,
    },

    #[error("malformed {what} in encoded stream")]
    Malformed { what: &'static str },

    #[error("unknown item type code {0:?}")]
    UnknownItemType(char),

    #[error("path table reference {0} is out of range")]
    BadPathIndex(usize),

    #[error("bitmap truncated: needed {needed} bytes at offset {offset}")]
    BitmapTruncated { offset: usize, needed: usize },

    #[error("corrupt bitmap: container {container} starts at {cursor}, offset table says {expected}")]
    BitmapOffset {
        container: usize,
        cursor: usize,
        expected: usize,
    },

    #[error("bitmap is not valid base64: {0}")]
    Base64(String),
}

/// Error returned when loading a search index fails.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// One crate's payload failed to decode.
    #[error("search index for crate '{crate_name}' is corrupt: {source}")]
    Corrupt {
        crate_name: String,
        #[source]
        source: CorruptIndex,
    },

    /// The index file could not be read.
    #[error("failed to read search index at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The index file is not the expected JSON shape.
    #[error("failed to parse search index at {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    pub(crate) fn corrupt(crate_name: &str, source: CorruptIndex) -> Self {
        Self::Corrupt {
            crate_name: crate_name.to_string(),
            source,
        }
    }
}
