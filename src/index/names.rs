//! Interning of lowercase type names.
//!
//! Matching compares integers, never strings: every path named by a signature
//! and every resolved query element carries a [`NameId`] from this table.

use super::item::NameId;
use ahash::AHashMap;

/// Built-in type families that match each other.
///
/// Members are registered before their bucket, so the table order fixes the
/// first ten ids. A query naming the bucket (`[]`, `()`, `->`) matches any
/// member, and the fingerprint hashes every member as its bucket.
const COLLAPSE_GROUPS: [(&str, &[&str]); 3] = [
    ("[]", &["array", "slice"]),
    ("()", &["tuple", "unit"]),
    ("->", &["fn", "fnmut", "fnonce"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NameEntry {
    id: NameId,
    assoc_only: bool,
}

/// Lowercase name to id map, preserving registration order.
#[derive(Debug, Clone, Default)]
pub struct TypeNames {
    by_name: AHashMap<String, NameEntry>,
    names: Vec<String>,
}

impl TypeNames {
    /// Returns the id for `name`, registering it if needed.
    ///
    /// A name stays "associated type only" while every registration of it
    /// came from an associated-type binding.
    pub fn intern(&mut self, name: &str, is_assoc_type: bool) -> Option<NameId> {
        if name.is_empty() {
            return None;
        }
        if let Some(entry) = self.by_name.get_mut(name) {
            entry.assoc_only &= is_assoc_type;
            return Some(entry.id);
        }
        let id = NameId(self.names.len() as u32);
        self.by_name.insert(
            name.to_string(),
            NameEntry {
                id,
                assoc_only: is_assoc_type,
            },
        );
        self.names.push(name.to_string());
        Some(id)
    }

    pub fn get(&self, name: &str) -> Option<NameId> {
        self.by_name.get(name).map(|e| e.id)
    }

    /// Looks up a name the way a query may use it: associated-type-only names
    /// are hidden unless `is_assoc_type` is set.
    pub fn resolve(&self, name: &str, is_assoc_type: bool) -> Option<NameId> {
        self.by_name
            .get(name)
            .filter(|e| is_assoc_type || !e.assoc_only)
            .map(|e| e.id)
    }

    pub fn name(&self, id: NameId) -> &str {
        self.names.get(id.0 as usize).map_or("", String::as_str)
    }

    /// Names usable from a query, in registration order.
    pub fn candidates(&self, is_assoc_type: bool) -> impl Iterator<Item = (NameId, &str)> {
        self.names.iter().filter_map(move |name| {
            let entry = self.by_name.get(name)?;
            (is_assoc_type || !entry.assoc_only).then_some((entry.id, name.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CollapseGroup {
    bucket: NameId,
    members: Vec<NameId>,
}

/// Ids of the built-in families, resolved against one [`TypeNames`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialTypes {
    groups: Vec<CollapseGroup>,
}

impl SpecialTypes {
    /// Registers the built-in names; must run on an empty table.
    pub fn register(names: &mut TypeNames) -> Self {
        let groups = COLLAPSE_GROUPS
            .iter()
            .map(|(bucket, members)| {
                let members = members
                    .iter()
                    .filter_map(|m| names.intern(m, false))
                    .collect();
                let bucket = names.intern(bucket, false).unwrap_or(NameId(0));
                CollapseGroup { bucket, members }
            })
            .collect();
        Self { groups }
    }

    /// Maps a family member to its bucket; other ids map to themselves.
    pub fn collapse(&self, id: NameId) -> NameId {
        self.groups
            .iter()
            .find(|g| g.members.contains(&id))
            .map_or(id, |g| g.bucket)
    }

    /// True for the bucket ids a query uses to mean "any member".
    pub fn is_bucket(&self, id: NameId) -> bool {
        self.groups.iter().any(|g| g.bucket == id)
    }

    /// Whether a query atom names the family a candidate atom belongs to.
    pub fn cross_matches(&self, query: NameId, candidate: NameId) -> bool {
        self.groups
            .iter()
            .any(|g| g.bucket == query && g.members.contains(&candidate))
    }
}
