//! Matching query types against function signatures.
//!
//! Unification looks for an assignment of the signature's generic parameters
//! to the query's generic variables under which every query element matches
//! some signature type. Where a direct match fails, a type may be "unboxed":
//! a generic parameter is replaced by its bounds and a concrete type by its
//! own generics, up to [`UNBOXING_LIMIT`] levels deep.

use crate::index::{FunctionType, ItemType, SpecialTypes, TypeRef};
use crate::query::QueryElement;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maximum unboxing depth; deeper candidates are non-matches.
pub const UNBOXING_LIMIT: usize = 5;

/// Item types a type filter also accepts besides its own.
const RELATED_FILTERS: [(ItemType, &[ItemType]); 4] = [
    (ItemType::Constant, &[ItemType::AssocConst]),
    (ItemType::Function, &[ItemType::Method, ItemType::TyMethod]),
    (ItemType::TypeAlias, &[ItemType::Primitive, ItemType::AssocType]),
    (ItemType::Trait, &[ItemType::TraitAlias]),
];

/// Whether an item or signature type of kind `ty` satisfies `filter`.
pub fn type_passes_filter(filter: Option<ItemType>, ty: Option<ItemType>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    let Some(ty) = ty else {
        return false;
    };
    filter == ty
        || RELATED_FILTERS
            .iter()
            .any(|(f, related)| *f == filter && related.contains(&ty))
}

/// What a signature generic has been committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericSlot {
    /// Bound to this query generic variable.
    Query(u32),
    /// Matched through its bounds instead of a query variable.
    Unboxed,
    /// Being unboxed right now; guards against cyclic bounds.
    Cycle,
}

/// Signature generic number to its commitment.
pub type Mgens = BTreeMap<u32, GenericSlot>;

/// Accepts or rejects a complete assignment; rejecting makes unification
/// backtrack and look for another one.
pub type SolutionCallback<'c> = dyn FnMut(Option<&Mgens>) -> bool + 'c;

fn slot(mgens: Option<&Mgens>, generic: u32) -> Option<GenericSlot> {
    mgens.and_then(|m| m.get(&generic)).copied()
}

fn with_slot(mgens: Option<&Mgens>, generic: u32, value: GenericSlot) -> Mgens {
    let mut scratch = mgens.cloned().unwrap_or_default();
    scratch.insert(generic, value);
    scratch
}

/// Unification against one function's where clause.
#[derive(Debug, Clone, Copy)]
pub struct Unifier<'a> {
    where_clause: &'a [Vec<Arc<FunctionType>>],
    special: &'a SpecialTypes,
}

impl<'a> Unifier<'a> {
    pub fn new(where_clause: &'a [Vec<Arc<FunctionType>>], special: &'a SpecialTypes) -> Self {
        Self {
            where_clause,
            special,
        }
    }

    fn bounds(&self, generic: u32) -> &'a [Arc<FunctionType>] {
        generic
            .checked_sub(1)
            .and_then(|i| self.where_clause.get(i as usize))
            .map_or(&[], Vec::as_slice)
    }

    /// True when every element of `query` matches a distinct type of
    /// `fn_types` under one consistent generic assignment that `accept` takes.
    pub fn unify(
        &self,
        fn_types: &[Arc<FunctionType>],
        query: &[QueryElement],
        mgens: Option<&Mgens>,
        accept: &mut SolutionCallback<'_>,
        depth: usize,
    ) -> bool {
        if depth >= UNBOXING_LIMIT {
            return false;
        }
        let Some((query_elem, query_rest)) = query.split_last() else {
            return accept(mgens);
        };
        if fn_types.is_empty() {
            return false;
        }
        if query_rest.is_empty() && query_elem.is_simple() {
            return self.unify_single(fn_types, query_elem, mgens, accept, depth);
        }

        // match the last query element first, then the rest against what is left
        for i in (0..fn_types.len()).rev() {
            let fn_type = &fn_types[i];
            if !self.is_match_candidate(fn_type, query_elem, mgens) {
                continue;
            }
            let scratch;
            let branch_mgens = match (fn_type.id, query_elem.id) {
                (TypeRef::Generic(fid), TypeRef::Generic(qid)) => {
                    if slot(mgens, fid).is_some_and(|s| s != GenericSlot::Query(qid)) {
                        continue;
                    }
                    scratch = with_slot(mgens, fid, GenericSlot::Query(qid));
                    Some(&scratch)
                }
                _ => mgens,
            };
            let mut remaining = fn_types.to_vec();
            remaining.swap_remove(i);
            let passes = self.unify(
                &remaining,
                query_rest,
                branch_mgens,
                &mut |solution: Option<&Mgens>| {
                    if !fn_type.has_parameters() && query_elem.is_simple() {
                        return accept(solution);
                    }
                    let Some((simplified, solutions)) =
                        self.check_bindings(fn_type, query_elem, solution, depth)
                    else {
                        return false;
                    };
                    solutions.iter().any(|m| {
                        self.unify(&simplified, &query_elem.generics, m.as_ref(), &mut *accept, depth)
                    })
                },
                depth,
            );
            if passes {
                return true;
            }
        }

        for i in (0..fn_types.len()).rev() {
            let fn_type = &fn_types[i];
            if !self.is_unbox_candidate(fn_type, query_elem, mgens, depth + 1) {
                continue;
            }
            let (branch_mgens, mut expanded) = match fn_type.id {
                TypeRef::Generic(fid) => {
                    if slot(mgens, fid).is_some_and(|s| s != GenericSlot::Unboxed) {
                        continue;
                    }
                    (
                        Some(with_slot(mgens, fid, GenericSlot::Unboxed)),
                        self.bounds(fid).to_vec(),
                    )
                }
                _ => (mgens.cloned(), fn_type.generics.clone()),
            };
            expanded.extend(fn_type.bindings.iter().flat_map(|(_, c)| c.iter().cloned()));
            let mut list = fn_types.to_vec();
            list.splice(i..=i, expanded);
            if self.unify(&list, query, branch_mgens.as_ref(), accept, depth + 1) {
                return true;
            }
        }
        false
    }

    fn unify_single(
        &self,
        fn_types: &[Arc<FunctionType>],
        query_elem: &QueryElement,
        mgens: Option<&Mgens>,
        accept: &mut SolutionCallback<'_>,
        depth: usize,
    ) -> bool {
        for fn_type in fn_types {
            if !self.is_match_candidate(fn_type, query_elem, mgens) {
                continue;
            }
            if let (TypeRef::Generic(fid), TypeRef::Generic(qid)) = (fn_type.id, query_elem.id) {
                if slot(mgens, fid).is_some_and(|s| s != GenericSlot::Query(qid)) {
                    continue;
                }
                if accept(Some(&with_slot(mgens, fid, GenericSlot::Query(qid)))) {
                    return true;
                }
            } else if accept(mgens) {
                return true;
            }
        }
        for fn_type in fn_types {
            if !self.is_unbox_candidate(fn_type, query_elem, mgens, depth + 1) {
                continue;
            }
            let query = std::slice::from_ref(query_elem);
            if let TypeRef::Generic(fid) = fn_type.id {
                if slot(mgens, fid).is_some_and(|s| s != GenericSlot::Unboxed) {
                    continue;
                }
                let scratch = with_slot(mgens, fid, GenericSlot::Unboxed);
                if self.unify(self.bounds(fid), query, Some(&scratch), accept, depth + 1) {
                    return true;
                }
            } else if self.unify(&fn_type.unboxed(), query, mgens, accept, depth + 1) {
                return true;
            }
        }
        false
    }

    /// Cheap checks that need no backtracking: kind filter, identity, generic
    /// consistency, parameter presence and the `::` path qualifier.
    pub fn is_match_candidate(
        &self,
        fn_type: &FunctionType,
        query_elem: &QueryElement,
        mgens: Option<&Mgens>,
    ) -> bool {
        if !type_passes_filter(query_elem.type_filter, fn_type.ty) {
            return false;
        }
        if let (TypeRef::Generic(fid), TypeRef::Generic(qid)) = (fn_type.id, query_elem.id) {
            let Some(mgens) = mgens else {
                return true;
            };
            return mgens.iter().all(|(&f, &s)| {
                let bound_here = s == GenericSlot::Query(qid);
                if f == fid { bound_here } else { !bound_here }
            });
        }
        let same_type = match (query_elem.id, fn_type.id) {
            (TypeRef::Named(q), TypeRef::Named(f)) => q == f || self.special.cross_matches(q, f),
            _ => false,
        };
        if !same_type {
            return false;
        }
        if !fn_type.has_parameters() && !query_elem.generics.is_empty() {
            return false;
        }
        if fn_type.bindings.len() < query_elem.bindings.len() {
            return false;
        }
        let wanted = &query_elem.path_without_last;
        if !wanted.is_empty() {
            let path: Vec<&str> = fn_type
                .path
                .as_deref()
                .map(|p| p.split("::").collect())
                .unwrap_or_default();
            if wanted.len() > path.len() {
                return false;
            }
            let mut matched = 0;
            for segment in path {
                if segment == wanted[matched] {
                    matched += 1;
                    if matched >= wanted.len() {
                        break;
                    }
                }
            }
            if matched < wanted.len() {
                return false;
            }
        }
        true
    }

    /// Unifies the query element's bindings against the signature type's.
    ///
    /// Returns the type's generics plus the constraints of every binding the
    /// query did not name, and every assignment under which the named
    /// bindings matched.
    fn check_bindings(
        &self,
        fn_type: &FunctionType,
        query_elem: &QueryElement,
        mgens: Option<&Mgens>,
        depth: usize,
    ) -> Option<(Vec<Arc<FunctionType>>, Vec<Option<Mgens>>)> {
        if fn_type.bindings.len() < query_elem.bindings.len() {
            return None;
        }
        if fn_type.bindings.is_empty() {
            return Some((fn_type.generics.clone(), vec![mgens.cloned()]));
        }
        let mut solutions = vec![mgens.cloned()];
        for binding in &query_elem.bindings {
            if solutions.is_empty() {
                return None;
            }
            let constraints = binding.id.and_then(|key| fn_type.binding(key))?;
            let mut next = Vec::new();
            for candidate in &solutions {
                self.unify(
                    constraints,
                    &binding.constraints,
                    candidate.as_ref(),
                    &mut |found: Option<&Mgens>| {
                        next.push(found.cloned());
                        // keep going to collect every solution
                        false
                    },
                    depth,
                );
            }
            solutions = next;
        }
        if solutions.is_empty() {
            return None;
        }
        let mut simplified = fn_type.generics.clone();
        for (key, constraints) in &fn_type.bindings {
            if !query_elem.bindings.iter().any(|b| b.id == Some(*key)) {
                simplified.extend(constraints.iter().cloned());
            }
        }
        Some((simplified, solutions))
    }

    fn is_unbox_candidate(
        &self,
        fn_type: &FunctionType,
        query_elem: &QueryElement,
        mgens: Option<&Mgens>,
        depth: usize,
    ) -> bool {
        if depth >= UNBOXING_LIMIT {
            return false;
        }
        if let TypeRef::Generic(fid) = fn_type.id
            && !query_elem.id.is_generic()
        {
            if slot(mgens, fid).is_some_and(|s| s != GenericSlot::Unboxed) {
                return false;
            }
            let scratch = with_slot(mgens, fid, GenericSlot::Cycle);
            return self.check_if_in_list(self.bounds(fid), query_elem, Some(&scratch), depth);
        }
        if fn_type.has_parameters() {
            return self.check_if_in_list(&fn_type.unboxed(), query_elem, mgens, depth);
        }
        false
    }

    /// Whether `query_elem` matches any entry of `list`, unboxing as needed.
    pub fn check_if_in_list(
        &self,
        list: &[Arc<FunctionType>],
        query_elem: &QueryElement,
        mgens: Option<&Mgens>,
        depth: usize,
    ) -> bool {
        list.iter()
            .any(|entry| self.check_type(entry, query_elem, mgens, depth))
    }

    fn check_type(
        &self,
        row: &Arc<FunctionType>,
        query_elem: &QueryElement,
        mgens: Option<&Mgens>,
        depth: usize,
    ) -> bool {
        if depth >= UNBOXING_LIMIT {
            return false;
        }
        if row.bindings.is_empty() && query_elem.bindings.is_empty() {
            if query_elem.id.is_generic() && mgens.is_none() {
                return row.id.is_generic()
                    || self.check_if_in_list(&row.generics, query_elem, mgens, depth + 1);
            }
            if let (TypeRef::Named(row_id), TypeRef::Named(query_id)) = (row.id, query_elem.id)
                && query_elem.path_without_last.is_empty()
                && type_passes_filter(query_elem.type_filter, row.ty)
                && query_elem.generics.is_empty()
                && !self.special.is_bucket(query_id)
            {
                return row_id == query_id
                    || self.check_if_in_list(&row.generics, query_elem, mgens, depth);
            }
        }
        self.unify(
            std::slice::from_ref(row),
            std::slice::from_ref(query_elem),
            mgens,
            &mut |_: Option<&Mgens>| true,
            depth,
        )
    }
}
