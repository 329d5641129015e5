//! Documentation aliases (`#[doc(alias = "...")]`).
//!
//! An alias matches only when the whole query equals it, ignoring case and
//! quotes. Alias hits go in front of the name results.

use super::href::build_href_and_path;
use super::{MAX_RESULTS, SearchOptions, SearchResult};
use crate::index::SearchIndex;
use std::cmp::Reverse;

/// Items aliased as `query`, split into those of the preferred crate and the
/// rest. Each list is ordered by path, descending.
fn lookup<'a>(
    index: &'a SearchIndex,
    query: &str,
    options: &SearchOptions<'_>,
) -> (Vec<&'a crate::index::Item>, Vec<&'a crate::index::Item>) {
    let key = query.to_lowercase();
    let mut crate_aliases = Vec::new();
    let mut aliases = Vec::new();
    for data in index.crates() {
        if options.filter_crate.is_some_and(|f| f != &*data.name) {
            continue;
        }
        let Some(ids) = data.aliases.get(&key) else {
            continue;
        };
        let target = if options.filter_crate.is_none() && options.current_crate == Some(&*data.name) {
            &mut crate_aliases
        } else {
            &mut aliases
        };
        target.extend(ids.iter().filter_map(|&id| index.item(id)));
    }
    aliases.sort_by_key(|item| Reverse(item.path.clone()));
    crate_aliases.sort_by_key(|item| Reverse(item.path.clone()));
    (crate_aliases, aliases)
}

/// Puts alias hits for `query` at the front of `others`.
///
/// Hits from the preferred crate end up first. The list stays within
/// [`MAX_RESULTS`] by dropping from the back.
pub fn add_aliases(
    index: &SearchIndex,
    others: &mut Vec<SearchResult>,
    query: &str,
    options: &SearchOptions<'_>,
) {
    let query = query.replace('"', "");
    let (crate_aliases, aliases) = lookup(index, &query, options);
    for item in aliases.into_iter().chain(crate_aliases) {
        let location = build_href_and_path(item, options.root_path);
        others.insert(0, SearchResult::alias(item, location, &query));
        if others.len() > MAX_RESULTS {
            others.pop();
        }
    }
}
