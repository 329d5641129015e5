//! Serde model of the serialized search payload.
//!
//! Field names are the single-letter keys rustdoc emits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `[ty, name, pathKey?, exactPathKey?]` entry of a crate's path table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPath {
    WithExactPath(u8, String, usize, usize),
    WithPath(u8, String, usize),
    Bare(u8, String),
}

impl RawPath {
    pub const fn ty(&self) -> u8 {
        match self {
            Self::WithExactPath(ty, ..) | Self::WithPath(ty, ..) | Self::Bare(ty, _) => *ty,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::WithExactPath(_, name, ..) | Self::WithPath(_, name, _) | Self::Bare(_, name) => name,
        }
    }

    pub const fn path_key(&self) -> Option<usize> {
        match self {
            Self::WithExactPath(_, _, key, _) | Self::WithPath(_, _, key) => Some(*key),
            Self::Bare(..) => None,
        }
    }

    pub const fn exact_path_key(&self) -> Option<usize> {
        match self {
            Self::WithExactPath(_, _, _, key) => Some(*key),
            _ => None,
        }
    }
}

/// One crate's payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCrate {
    /// Crate-level description.
    #[serde(default)]
    pub doc: String,
    /// One item-type character per item.
    #[serde(default)]
    pub t: String,
    /// Item names.
    #[serde(default)]
    pub n: Vec<String>,
    /// Sparse `[itemIndex, path]` entries.
    #[serde(default)]
    pub q: Vec<(usize, String)>,
    /// Re-exports: `[itemIndex, pathKey]`.
    #[serde(default)]
    pub r: Vec<(usize, usize)>,
    /// Parent of each item, 1-based into `p`; 0 for none.
    #[serde(default)]
    pub i: Vec<usize>,
    /// Implementation disambiguators: `[itemIndex, disambiguator]`.
    #[serde(default)]
    pub b: Vec<(usize, String)>,
    #[serde(default)]
    pub p: Vec<RawPath>,
    /// Description shard lengths.
    #[serde(default, rename = "D")]
    pub d: String,
    /// Deprecated items.
    #[serde(default)]
    pub c: String,
    /// Items without a description.
    #[serde(default)]
    pub e: String,
    /// Function signatures.
    #[serde(default)]
    pub f: String,
    /// Aliases to local item indices.
    #[serde(default)]
    pub a: BTreeMap<String, Vec<usize>>,
}

/// All crates of a documentation bundle, in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSearchIndex(pub Vec<(String, RawCrate)>);

/// On-disk index: the payload plus the description shards it points into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFile {
    pub crates: RawSearchIndex,
    /// Crate name to shards, each shard a list of descriptions.
    #[serde(default)]
    pub descriptions: BTreeMap<String, Vec<Vec<String>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn path_table_accepts_all_arities() {
        let_assert!(
            Ok(paths) = serde_json::from_str::<Vec<RawPath>>(r#"[[10,"Foo"],[5,"Bar",1],[6,"Baz",2,3]]"#)
        );
        check!(paths[0] == RawPath::Bare(10, "Foo".into()));
        check!(paths[1].path_key() == Some(1));
        check!(paths[1].exact_path_key().is_none());
        check!(paths[2].exact_path_key() == Some(3));
        check!(paths[2].name() == "Baz");
        check!(paths[2].ty() == 6);
    }

    #[test]
    fn crates_are_ordered_pairs() {
        let json = r#"[["core",{"t":"HH","n":["a","b"],"D":"d","f":"``"}],["alloc",{"t":""}]]"#;
        let_assert!(Ok(index) = serde_json::from_str::<RawSearchIndex>(json));
        check!(index.0.len() == 2);
        check!(index.0[0].0 == "core");
        check!(index.0[0].1.d == "d");
        check!(index.0[1].1.n.is_empty());
    }
}
