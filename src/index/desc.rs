//! Description shards.
//!
//! Item descriptions are not part of the search payload. Each crate splits
//! them into shards whose lengths come from the `D` stream; an item's position
//! is fixed at build time and the text is fetched only for items that end up in
//! a result list.

use ahash::AHashMap;
use anyhow::anyhow;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Boundaries of one description shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescShard {
    pub shard: usize,
    /// Number of described items before this shard, across the crate.
    pub start: usize,
    pub len: usize,
}

/// Future resolving to one shard's descriptions.
pub type ShardFuture<'a> = BoxFuture<'a, anyhow::Result<Arc<[String]>>>;

/// Where description shards come from.
pub trait DescriptionSource: Send + Sync {
    fn load_shard<'a>(&'a self, crate_name: &'a str, shard: usize) -> ShardFuture<'a>;
}

/// Shards held in memory, as read from an index file.
#[derive(Debug, Clone, Default)]
pub struct ShardedDescriptions {
    shards: AHashMap<String, Vec<Arc<[String]>>>,
}

impl ShardedDescriptions {
    pub fn new(descriptions: BTreeMap<String, Vec<Vec<String>>>) -> Self {
        let shards = descriptions
            .into_iter()
            .map(|(krate, shards)| (krate, shards.into_iter().map(Arc::from).collect::<Vec<_>>()))
            .collect();
        Self { shards }
    }

    pub fn shard_count(&self, crate_name: &str) -> usize {
        self.shards.get(crate_name).map_or(0, Vec::len)
    }
}

impl DescriptionSource for ShardedDescriptions {
    fn load_shard<'a>(&'a self, crate_name: &'a str, shard: usize) -> ShardFuture<'a> {
        let found = self
            .shards
            .get(crate_name)
            .and_then(|shards| shards.get(shard))
            .cloned()
            .ok_or_else(|| anyhow!("description shard {shard} of crate '{crate_name}' is missing"));
        futures::future::ready(found).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[tokio::test]
    async fn serves_shards_by_crate_and_position() {
        let mut map = BTreeMap::new();
        map.insert(
            "demo".to_string(),
            vec![vec!["crate docs".to_string(), "first".to_string()], vec!["second".to_string()]],
        );
        let source = ShardedDescriptions::new(map);
        check!(source.shard_count("demo") == 2);

        let_assert!(Ok(shard) = source.load_shard("demo", 1).await);
        check!(shard[0] == "second");

        let_assert!(Err(e) = source.load_shard("demo", 2).await);
        check!(e.to_string().contains("shard 2"));
        let_assert!(Err(_) = source.load_shard("other", 0).await);
    }
}
