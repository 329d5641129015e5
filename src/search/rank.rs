//! Candidate bookkeeping, ordering and de-duplication.

use super::edit_distance::edit_distance;
use super::href::build_href_and_path;
use super::{MAX_RESULTS, SearchResult};
use crate::index::{Item, ItemType, SearchIndex};
use ahash::AHashSet;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A matched item before ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: usize,
    /// Character offset of the query inside the item name, if it occurs.
    pub index: Option<usize>,
    pub dist: usize,
    pub path_dist: usize,
    /// Exact-name hit of a quoted search; never replaced.
    pub dont_validate: bool,
}

/// Candidates of one result list, keyed by item id.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    entries: BTreeMap<usize, Candidate>,
    /// Largest distance accepted so far; bounds the list once it is full.
    pub max_dist: usize,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_RESULTS
    }

    /// Records a candidate when it is close enough or contains the query.
    /// An existing entry is kept when it is pinned or at least as close.
    pub fn add(&mut self, candidate: Candidate, max_edit_distance: usize) {
        if candidate.dist > max_edit_distance && candidate.index.is_none() {
            return;
        }
        if let Some(existing) = self.entries.get(&candidate.id)
            && (existing.dont_validate || existing.dist <= candidate.dist)
        {
            return;
        }
        self.entries.insert(candidate.id, candidate);
    }

    pub fn get(&self, id: usize) -> Option<&Candidate> {
        self.entries.get(&id)
    }

    pub fn into_candidates(self) -> impl Iterator<Item = Candidate> {
        self.entries.into_values()
    }
}

/// Distance between a query's leading path segments and an item's path.
///
/// The item path is its module path plus its parent's name. Every window of
/// the item path as long as the query path is scored, segment by segment: a
/// segment containing the query segment costs a third of the leftover length
/// when that is within bounds, anything else its edit distance. Returns `None`
/// when no window is within a third of the query path's length.
pub fn check_path(context: &[String], item: &Item) -> Option<usize> {
    if context.is_empty() {
        return Some(0);
    }
    let total: usize = context.iter().map(|s| s.chars().count()).sum();
    let max_dist = total / 3;

    let mut path: Vec<String> = item
        .path
        .split("::")
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect();
    if let Some(parent) = &item.parent {
        path.push(parent.name.to_lowercase());
    }
    if path.len() < context.len() {
        return None;
    }

    let mut best = None::<usize>;
    'windows: for start in (0..=path.len() - context.len()).rev() {
        let mut dist_total = 0;
        for (segment, wanted) in path[start..].iter().zip(context) {
            let seg_len = segment.chars().count();
            let wanted_len = wanted.chars().count();
            let leftover = seg_len.saturating_sub(wanted_len) / 3;
            if leftover <= max_dist && segment.contains(wanted.as_str()) {
                dist_total += leftover;
            } else {
                let dist = edit_distance(segment, wanted, max_dist);
                if dist > max_dist {
                    continue 'windows;
                }
                dist_total += dist;
            }
        }
        // rounds half up
        let average = (2 * dist_total + context.len()) / (2 * context.len());
        best = Some(best.map_or(average, |b| b.min(average)));
    }
    best.filter(|&b| b <= max_dist)
}

struct SortKey<'a> {
    candidate: Candidate,
    item: &'a Item,
    deprecated: bool,
    empty_desc: bool,
}

fn compare(a: &SortKey<'_>, b: &SortKey<'_>, user_query: &str, preferred: Option<&str>) -> Ordering {
    let (ca, cb) = (&a.candidate, &b.candidate);
    let not_preferred = |k: &SortKey<'_>| preferred != Some(&*k.item.crate_name);
    (a.item.word != user_query)
        .cmp(&(b.item.word != user_query))
        .then_with(|| ca.index.is_none().cmp(&cb.index.is_none()))
        .then_with(|| ca.path_dist.cmp(&cb.path_dist))
        .then_with(|| ca.index.cmp(&cb.index))
        .then_with(|| ca.dist.cmp(&cb.dist))
        .then_with(|| a.deprecated.cmp(&b.deprecated))
        .then_with(|| not_preferred(a).cmp(&not_preferred(b)))
        .then_with(|| a.item.word.chars().count().cmp(&b.item.word.chars().count()))
        .then_with(|| a.item.word.cmp(&b.item.word))
        .then_with(|| a.empty_desc.cmp(&b.empty_desc))
        .then_with(|| a.item.ty.ordinal().cmp(&b.item.ty.ordinal()))
        .then_with(|| a.item.path.cmp(&b.item.path))
}

/// Orders a result list, drops duplicates and caps it at [`MAX_RESULTS`].
///
/// Two rows are duplicates when they share `exact_path::name` and kind; a
/// re-export is also dropped when the item it re-exports is already listed,
/// and an item is dropped when a re-export of it came first.
pub fn sort_results(
    index: &SearchIndex,
    results: ResultSet,
    user_query: &str,
    preferred_crate: Option<&str>,
    root_path: &str,
) -> Vec<SearchResult> {
    let mut keyed: Vec<SortKey<'_>> = results
        .into_candidates()
        .filter_map(|candidate| {
            let item = index.item(candidate.id)?;
            Some(SortKey {
                candidate,
                item,
                deprecated: index.is_deprecated(item),
                empty_desc: index.has_empty_desc(item),
            })
        })
        .collect();
    keyed.sort_by(|a, b| compare(a, b, user_query, preferred_crate));

    let mut seen = AHashSet::new();
    let mut out = Vec::new();
    for key in keyed {
        let location = build_href_and_path(key.item, root_path);
        let typed = format!("{}|{}", location.full_path, key.item.ty.ordinal());
        let reexported = format!("{}|{}", location.full_path, ItemType::Import.ordinal());
        if seen.contains(&typed)
            || (key.item.ty == ItemType::Import && seen.contains(&location.full_path))
            || seen.contains(&reexported)
        {
            continue;
        }
        seen.insert(typed);
        seen.insert(location.full_path.clone());
        out.push(SearchResult::new(key.item, location, &key.candidate));
        if out.len() >= MAX_RESULTS {
            break;
        }
    }
    out
}
