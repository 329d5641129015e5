//! Runs a parsed query against the index.

use super::alias::add_aliases;
use super::edit_distance::edit_distance;
use super::rank::{Candidate, ResultSet, check_path, sort_results};
use super::unify::{Mgens, Unifier, type_passes_filter};
use super::{MAX_RESULTS, ResultsTable, SearchOptions};
use crate::index::{FingerprintBuilder, Item, ItemType, NameId, SearchIndex, TypeFingerprint, TypeNames, TypeRef};
use crate::query::{ParsedQuery, QueryBinding, QueryElement, QueryError, query_error};

/// Executes `query` and returns the three ranked result lists.
///
/// A query that failed to parse yields empty lists (plus any alias hits) and
/// keeps its error. Descriptions are not loaded; see
/// [`ResultsTable::load_descriptions`].
pub fn execute(index: &SearchIndex, mut query: ParsedQuery, options: &SearchOptions<'_>) -> ResultsTable {
    let mut lists = ResultLists::default();
    if query.error.is_none() {
        run_query(index, &mut query, options, &mut lists);
    }

    let rank = |set| sort_results(index, set, &query.user_query, options.current_crate, options.root_path);
    let in_args = rank(lists.in_args);
    let returned = rank(lists.returned);
    let mut others = rank(lists.others);
    add_aliases(index, &mut others, &query.original, options);

    if query.error.is_some() && !others.is_empty() {
        query.error = None;
    }
    tracing::debug!(
        query = %query.original,
        others = others.len(),
        in_args = in_args.len(),
        returned = returned.len(),
        "executed search"
    );
    ResultsTable {
        in_args,
        returned,
        others,
        query,
    }
}

#[derive(Debug, Default)]
struct ResultLists {
    in_args: ResultSet,
    returned: ResultSet,
    others: ResultSet,
}

fn run_query(index: &SearchIndex, query: &mut ParsedQuery, options: &SearchOptions<'_>, lists: &mut ResultLists) {
    let query_len: usize = query.all_elements().map(|e| e.path_last.chars().count()).sum();
    let max_edit_distance = query_len / 3;

    let mut resolver = NameResolver {
        names: index.names(),
        literal: query.literal_search,
        total_elems: query.total_elems,
        max_edit_distance,
        generics: Vec::new(),
        correction: None,
        proposal: None,
        error: None,
    };
    let mut fingerprint = FingerprintBuilder::new(index.special());
    for elem in query.elems.iter_mut().chain(query.returned.iter_mut()) {
        resolver.resolve(elem, false);
        add_query_element(&mut fingerprint, elem);
    }
    query.correction = resolver.correction;
    if let Some((from, to)) = resolver.proposal {
        query.propose_correction_from = Some(from);
        query.propose_correction_to = Some(to);
    }
    if resolver.error.is_some() {
        query.error = resolver.error;
    }
    let query_fp = fingerprint.finish();

    let search = Search {
        index,
        options,
        query_fp,
        literal: query.literal_search,
    };
    if query.found_elems == 1 && query.returned.is_empty() {
        if let [elem] = query.elems.as_slice() {
            for item in index.items() {
                search.single_arg(item, elem, lists, max_edit_distance);
            }
        }
    } else if query.found_elems > 0 {
        // unification consumes elements from the end, and a simple last
        // element takes the fast path
        let order = |e: &QueryElement| (e.is_simple(), matches!(e.id, TypeRef::Named(_)));
        query.elems.sort_by_key(order);
        query.returned.sort_by_key(order);
        for item in index.items() {
            search.args(item, query, &mut lists.others);
        }
    }
}

fn add_query_element(fingerprint: &mut FingerprintBuilder<'_>, elem: &QueryElement) {
    fingerprint.add_atom(elem.id);
    for generic in &elem.generics {
        add_query_element(fingerprint, generic);
    }
    for binding in &elem.bindings {
        if let Some(key) = binding.id {
            fingerprint.add_atom(TypeRef::Named(key));
        }
        for constraint in &binding.constraints {
            add_query_element(fingerprint, constraint);
        }
    }
}

/// Closest interned name to `target` within `max`, ties going to the
/// lexicographically larger name.
fn closest_name<'a>(
    candidates: impl Iterator<Item = (NameId, &'a str)>,
    max: usize,
    distance: impl Fn(&str) -> usize,
) -> Option<(NameId, &'a str)> {
    let mut best: Option<(NameId, &str, usize)> = None;
    for (id, name) in candidates {
        let dist = distance(name);
        if dist > max {
            continue;
        }
        if let Some((_, best_name, best_dist)) = best
            && (dist > best_dist || (dist == best_dist && best_name > name))
        {
            continue;
        }
        best = Some((id, name, dist));
    }
    best.map(|(id, name, _)| (id, name))
}

/// Resolves query element names to interned ids for one query.
struct NameResolver<'a> {
    names: &'a TypeNames,
    literal: bool,
    total_elems: usize,
    max_edit_distance: usize,
    /// Names of the query's generic variables; variable `n` is at `n - 1`.
    generics: Vec<String>,
    correction: Option<String>,
    proposal: Option<(String, String)>,
    error: Option<QueryError>,
}

impl NameResolver<'_> {
    fn resolve(&mut self, elem: &mut QueryElement, is_assoc_type: bool) {
        let lowered = elem.path_last.to_lowercase();
        if let Some(id) = self.names.resolve(&lowered, is_assoc_type) {
            elem.id = TypeRef::Named(id);
        } else if !self.literal {
            let max = self.max_edit_distance;
            let found = closest_name(self.names.candidates(is_assoc_type), max, |name| {
                edit_distance(name, &lowered, max).min(edit_distance(name, &elem.normalized_path_last, max))
            });
            elem.id = match found {
                Some((id, name)) => {
                    self.correction = Some(name.to_string());
                    TypeRef::Named(id)
                }
                None => TypeRef::Wildcard,
            };
        }

        let unresolved_atom = elem.id == TypeRef::Wildcard
            && self.total_elems > 1
            && elem.type_filter.is_none()
            && elem.is_simple();
        if unresolved_atom || elem.type_filter == Some(ItemType::Generic) {
            let number = match self.generics.iter().position(|g| *g == elem.name) {
                Some(i) => i + 1,
                None => {
                    self.generics.push(elem.name.clone());
                    self.generics.len()
                }
            };
            elem.id = TypeRef::Generic(number as u32);
            if elem.type_filter.is_none() && elem.name.chars().count() >= 3 {
                // a generic that looks like a known type was probably a typo
                let max = elem.name.chars().count() / 3;
                let name = &elem.name;
                if let Some((_, to)) = closest_name(self.names.candidates(true), max, |candidate| {
                    edit_distance(candidate, name, max)
                }) {
                    self.proposal = Some((elem.name.clone(), to.to_string()));
                }
            }
            elem.type_filter = Some(ItemType::Generic);
        }

        if !elem.generics.is_empty() && elem.type_filter == Some(ItemType::Generic) {
            self.error = Some(query_error!(
                "Generic type parameter ",
                elem.name,
                " does not accept generic parameters"
            ));
        }
        for generic in &mut elem.generics {
            self.resolve(generic, false);
        }

        let mut bindings: Vec<QueryBinding> = Vec::with_capacity(elem.bindings.len());
        for mut binding in std::mem::take(&mut elem.bindings) {
            binding.id = self.names.get(&binding.name);
            if binding.id.is_none() {
                self.error = Some(query_error!("Type parameter ", binding.name, " does not exist"));
                binding.constraints.clear();
            }
            for constraint in &mut binding.constraints {
                self.resolve(constraint, false);
            }
            match bindings.iter_mut().find(|b| b.id == binding.id) {
                Some(existing) => existing.constraints = binding.constraints,
                None => bindings.push(binding),
            }
        }
        elem.bindings = bindings;
    }
}

struct Search<'a> {
    index: &'a SearchIndex,
    options: &'a SearchOptions<'a>,
    query_fp: TypeFingerprint,
    literal: bool,
}

impl Search<'_> {
    fn in_scope(&self, item: &Item) -> bool {
        self.options.filter_crate.is_none_or(|c| c == &*item.crate_name)
    }

    fn candidate(&self, item: &Item, index: Option<usize>, dist: usize, path_dist: usize) -> Candidate {
        Candidate {
            id: item.id,
            index,
            dist,
            path_dist,
            dont_validate: self.literal,
        }
    }

    /// Adds a type-match candidate while the list has room, or once full only
    /// when it is no farther than the worst accepted so far.
    fn add_type_match(&self, set: &mut ResultSet, item: &Item, fp_dist: usize) {
        set.max_dist = set.max_dist.max(fp_dist);
        let max = if set.len() < MAX_RESULTS {
            fp_dist + 1
        } else {
            set.max_dist
        };
        set.add(self.candidate(item, None, fp_dist, 0), max);
    }

    /// One-element query: match the name and look for the type among the
    /// item's arguments and return types.
    fn single_arg(&self, item: &Item, elem: &QueryElement, lists: &mut ResultLists, max_edit_distance: usize) {
        if !self.in_scope(item) {
            return;
        }
        if let Some(fp_dist) = TypeFingerprint::compare(&self.index.fingerprint(item.id), &self.query_fp)
            && let Some(sig) = &item.signature
        {
            let unifier = Unifier::new(&sig.where_clause, self.index.special());
            let fp_dist = fp_dist as usize;
            if unifier.check_if_in_list(&sig.inputs, elem, None, 0) {
                self.add_type_match(&mut lists.in_args, item, fp_dist);
            }
            if unifier.check_if_in_list(&sig.output, elem, None, 0) {
                self.add_type_match(&mut lists.returned, item, fp_dist);
            }
        }

        if !type_passes_filter(elem.type_filter, Some(item.ty)) {
            return;
        }

        let word_index = char_index(&item.word, &elem.path_last);
        let normalized_index = char_index(&item.normalized_name, &elem.path_last);
        let index = match (word_index, normalized_index) {
            (Some(w), Some(n)) => Some(w.min(n)),
            (w, n) => w.or(n),
        };

        let mut path_dist = 0;
        if elem.full_path.len() > 1 {
            let Some(dist) = check_path(&elem.path_without_last, item) else {
                return;
            };
            path_dist = dist;
        }

        if self.literal {
            if item.word == elem.path_last {
                lists.others.add(self.candidate(item, index, 0, path_dist), 0);
            }
            return;
        }

        let dist = edit_distance(&item.normalized_name, &elem.normalized_path_last, max_edit_distance);
        if index.is_none() && dist > max_edit_distance {
            return;
        }
        lists
            .others
            .add(self.candidate(item, index, dist, path_dist), max_edit_distance);
    }

    /// Signature query: every input element must unify with the inputs, and
    /// under the same generic assignment every returned element with the
    /// output.
    fn args(&self, item: &Item, query: &ParsedQuery, results: &mut ResultSet) {
        if !self.in_scope(item) {
            return;
        }
        let Some(sig) = &item.signature else {
            return;
        };
        let Some(fp_dist) = TypeFingerprint::compare(&self.index.fingerprint(item.id), &self.query_fp) else {
            return;
        };
        let fp_dist = fp_dist as usize;
        if results.is_full() && fp_dist > results.max_dist {
            return;
        }

        let unifier = Unifier::new(&sig.where_clause, self.index.special());
        let matched = unifier.unify(
            &sig.inputs,
            &query.elems,
            None,
            &mut |mgens: Option<&Mgens>| {
                unifier.unify(&sig.output, &query.returned, mgens, &mut |_: Option<&Mgens>| true, 0)
            },
            0,
        );
        if !matched {
            return;
        }
        results.max_dist = results.max_dist.max(fp_dist);
        results.add(self.candidate(item, Some(0), fp_dist, 0), usize::MAX);
    }
}

/// Character offset of `needle` in `haystack`.
fn char_index(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte| haystack[..byte].chars().count())
}
