//! The in-memory search index.
//!
//! Items from every crate live in one flat table; an item's id is its position.
//! Each crate contributes a synthetic crate row followed by its items, so ids of
//! later crates continue where earlier ones stop.

pub mod builder;
pub mod desc;
pub mod file;
pub mod fingerprint;
pub mod item;
pub mod names;
pub mod raw;

pub use builder::build_index;
pub use desc::{DescShard, DescriptionSource, ShardedDescriptions};
pub use file::{LoadedIndex, content_digest, parse_index_file, read_index_file};
pub use fingerprint::{FingerprintBuilder, TypeFingerprint};
pub use item::{DescLocation, FunctionSignature, FunctionType, Item, ItemType, NameId, PathEntry, TypeRef};
pub use names::{SpecialTypes, TypeNames};
pub use raw::{IndexFile, RawCrate, RawPath, RawSearchIndex};

use crate::codec::RoaringBitmap;
use ahash::AHashMap;
use std::ops::Range;

/// Per-crate data that is not stored on item rows.
#[derive(Debug, Clone)]
pub struct CrateData {
    pub name: std::sync::Arc<str>,
    /// Crate-level description, shown for the crate row.
    pub doc: String,
    pub deprecated: RoaringBitmap,
    pub empty_desc: RoaringBitmap,
    /// Lowercase alias to global item ids.
    pub aliases: AHashMap<String, Vec<usize>>,
    pub shards: Vec<DescShard>,
    pub crate_row: usize,
    /// Ids of the crate's rows, crate row included.
    pub items: Range<usize>,
}

/// All loaded crates, queryable by [`crate::search::execute`].
#[derive(Debug, Clone)]
pub struct SearchIndex {
    pub(crate) items: Vec<Item>,
    pub(crate) fingerprints: Vec<TypeFingerprint>,
    pub(crate) names: TypeNames,
    pub(crate) special: SpecialTypes,
    pub(crate) crates: Vec<CrateData>,
}

impl SearchIndex {
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: usize) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn fingerprint(&self, id: usize) -> TypeFingerprint {
        self.fingerprints.get(id).copied().unwrap_or_default()
    }

    pub fn names(&self) -> &TypeNames {
        &self.names
    }

    pub fn special(&self) -> &SpecialTypes {
        &self.special
    }

    pub fn crates(&self) -> &[CrateData] {
        &self.crates
    }

    pub fn crate_data(&self, name: &str) -> Option<&CrateData> {
        self.crates.iter().find(|c| &*c.name == name)
    }

    /// Crate names in load order.
    pub fn crate_names(&self) -> impl Iterator<Item = &str> {
        self.crates.iter().map(|c| &*c.name)
    }

    pub fn is_deprecated(&self, item: &Item) -> bool {
        self.crate_data(&item.crate_name)
            .is_some_and(|c| c.deprecated.contains(item.bit_index))
    }

    pub fn has_empty_desc(&self, item: &Item) -> bool {
        self.crate_data(&item.crate_name)
            .is_some_and(|c| c.empty_desc.contains(item.bit_index))
    }

    /// Fetches one item's description.
    ///
    /// Crate rows use the crate-level doc string; items flagged as having no
    /// description return an empty string without touching `source`.
    pub async fn description(
        &self,
        source: &dyn DescriptionSource,
        item: &Item,
    ) -> anyhow::Result<String> {
        if item.ty == ItemType::ExternCrate && item.bit_index == 0 {
            return Ok(self
                .crate_data(&item.crate_name)
                .map(|c| c.doc.clone())
                .unwrap_or_default());
        }
        if self.has_empty_desc(item) {
            return Ok(String::new());
        }
        let shard = source.load_shard(&item.crate_name, item.desc.shard).await?;
        shard.get(item.desc.index).cloned().ok_or_else(|| {
            anyhow::anyhow!(
                "description {} missing from shard {} of crate '{}'",
                item.desc.index,
                item.desc.shard,
                item.crate_name
            )
        })
    }
}
