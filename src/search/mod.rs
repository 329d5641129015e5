//! Query execution over a [`SearchIndex`].
//!
//! A single bare name searches item names, arguments and return types at once.
//! Anything with more structure (several elements, generics, `->`) is a
//! signature search answered by [`unify`]. Results come back in three ranked
//! lists; see [`execute`].

pub mod alias;
pub mod edit_distance;
pub mod exec;
pub mod href;
pub mod rank;
pub mod unify;

pub use edit_distance::edit_distance;
pub use exec::execute;
pub use href::{ItemLocation, build_href_and_path};

use crate::index::{DescriptionSource, Item, ItemType, SearchIndex};
use crate::query::ParsedQuery;
use ahash::AHashMap;
use futures::future::try_join_all;
use rank::Candidate;
use serde::Serialize;
use std::sync::Arc;

/// Upper bound on every result list.
pub const MAX_RESULTS: usize = 200;

/// Per-search settings.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions<'a> {
    /// Only search this crate.
    pub filter_crate: Option<&'a str>,
    /// Rank this crate's items first.
    pub current_crate: Option<&'a str>,
    /// Prefix of every generated href.
    pub root_path: &'a str,
}

impl Default for SearchOptions<'_> {
    fn default() -> Self {
        Self {
            filter_crate: None,
            current_crate: None,
            root_path: "../",
        }
    }
}

/// One row of a result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub id: usize,
    pub name: String,
    pub ty: ItemType,
    #[serde(rename = "crate")]
    pub crate_name: String,
    pub path: String,
    pub display_path: String,
    pub href: String,
    pub full_path: String,
    /// Filled in by [`ResultsTable::load_descriptions`].
    pub desc: Option<String>,
    /// The alias text, for rows found through an alias.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub dist: usize,
    pub path_dist: usize,
    pub index: Option<usize>,
}

impl SearchResult {
    fn new(item: &Item, location: ItemLocation, candidate: &Candidate) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            ty: item.ty,
            crate_name: item.crate_name.to_string(),
            path: item.path.to_string(),
            display_path: location.display_path,
            href: location.href,
            full_path: location.full_path,
            desc: None,
            alias: None,
            dist: candidate.dist,
            path_dist: candidate.path_dist,
            index: candidate.index,
        }
    }

    fn alias(item: &Item, location: ItemLocation, alias: &str) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            ty: item.ty,
            crate_name: item.crate_name.to_string(),
            path: item.path.to_string(),
            full_path: format!("{}{}", location.display_path, item.name),
            display_path: location.display_path,
            href: location.href,
            desc: None,
            alias: Some(alias.to_string()),
            dist: 0,
            path_dist: 0,
            index: None,
        }
    }

    pub const fn is_alias(&self) -> bool {
        self.alias.is_some()
    }
}

/// Everything a search produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultsTable {
    /// Functions taking the searched type.
    pub in_args: Vec<SearchResult>,
    /// Functions returning the searched type.
    pub returned: Vec<SearchResult>,
    /// Name matches, or signature matches for type queries.
    pub others: Vec<SearchResult>,
    pub query: ParsedQuery,
}

impl ResultsTable {
    pub fn is_empty(&self) -> bool {
        self.in_args.is_empty() && self.returned.is_empty() && self.others.is_empty()
    }

    /// Fetches descriptions for every row.
    ///
    /// Each needed shard is requested once, concurrently.
    pub async fn load_descriptions(
        &mut self,
        index: &SearchIndex,
        source: &dyn DescriptionSource,
    ) -> anyhow::Result<()> {
        let mut wanted = Vec::new();
        for result in self.rows() {
            if let Some(item) = index.item(result.id)
                && needs_shard(index, item)
            {
                let key = (Arc::clone(&item.crate_name), item.desc.shard);
                if !wanted.contains(&key) {
                    wanted.push(key);
                }
            }
        }

        let loaded = try_join_all(wanted.iter().map(|(krate, shard)| async move {
            let descriptions = source.load_shard(krate, *shard).await?;
            anyhow::Ok(((Arc::clone(krate), *shard), descriptions))
        }))
        .await?;
        let shards: AHashMap<_, _> = loaded.into_iter().collect();

        for result in self.rows_mut() {
            let Some(item) = index.item(result.id) else {
                continue;
            };
            let desc = if is_crate_row(item) {
                index
                    .crate_data(&item.crate_name)
                    .map(|c| c.doc.clone())
                    .unwrap_or_default()
            } else if index.has_empty_desc(item) {
                String::new()
            } else {
                shards
                    .get(&(Arc::clone(&item.crate_name), item.desc.shard))
                    .and_then(|shard| shard.get(item.desc.index))
                    .cloned()
                    .unwrap_or_default()
            };
            result.desc = Some(desc);
        }
        tracing::debug!(shards = shards.len(), "loaded descriptions");
        Ok(())
    }

    fn rows(&self) -> impl Iterator<Item = &SearchResult> {
        self.others.iter().chain(&self.in_args).chain(&self.returned)
    }

    fn rows_mut(&mut self) -> impl Iterator<Item = &mut SearchResult> {
        self.others
            .iter_mut()
            .chain(self.in_args.iter_mut())
            .chain(self.returned.iter_mut())
    }
}

fn is_crate_row(item: &Item) -> bool {
    item.ty == ItemType::ExternCrate && item.bit_index == 0
}

fn needs_shard(index: &SearchIndex, item: &Item) -> bool {
    !is_crate_row(item) && !index.has_empty_desc(item)
}
