//! Parsed query structures.

use super::QueryError;
use crate::index::{ItemType, NameId, TypeRef};
use serde::Serialize;

/// One associated-type binding of a query element, `name=constraints`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryBinding {
    pub name: String,
    /// Interned associated type, once resolved against an index.
    #[serde(skip)]
    pub id: Option<NameId>,
    pub constraints: Vec<QueryElement>,
}

/// A type or name the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryElement {
    /// Lowercased text of the element as written, without generics.
    pub name: String,
    /// Resolved identity; `Wildcard` until resolved and when nothing matched.
    #[serde(skip)]
    pub id: TypeRef,
    pub full_path: Vec<String>,
    pub path_without_last: Vec<String>,
    pub path_last: String,
    /// `path_last` without underscores.
    pub normalized_path_last: String,
    pub generics: Vec<QueryElement>,
    pub bindings: Vec<QueryBinding>,
    pub type_filter: Option<ItemType>,
}

impl QueryElement {
    /// Element for a built-in shape such as `()`, `[]`, `->` or `reference`.
    pub(crate) fn primitive(name: &str, type_filter: Option<ItemType>) -> Self {
        Self {
            name: name.to_string(),
            id: TypeRef::Wildcard,
            full_path: vec![name.to_string()],
            path_without_last: Vec::new(),
            path_last: name.to_string(),
            normalized_path_last: name.to_string(),
            generics: Vec::new(),
            bindings: Vec::new(),
            type_filter,
        }
    }

    pub fn binding(&self, key: NameId) -> Option<&[Self]> {
        self.bindings
            .iter()
            .find(|b| b.id == Some(key))
            .map(|b| b.constraints.as_slice())
    }

    /// No generics and no bindings.
    pub fn is_simple(&self) -> bool {
        self.generics.is_empty() && self.bindings.is_empty()
    }
}

/// Result of parsing a query string.
///
/// Parsing never fails outright: a syntax error produces an empty query with
/// [`ParsedQuery::error`] set, so callers always have something to display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    /// Trimmed query with its original casing.
    pub original: String,
    /// Lowercased working copy of `original`.
    pub user_query: String,
    pub elems: Vec<QueryElement>,
    pub returned: Vec<QueryElement>,
    /// Top-level elements: `elems.len() + returned.len()`.
    pub found_elems: usize,
    /// Every element, generics included.
    pub total_elems: usize,
    pub literal_search: bool,
    pub error: Option<QueryError>,
    /// Type name substituted for a misspelled one.
    pub correction: Option<String>,
    pub propose_correction_from: Option<String>,
    pub propose_correction_to: Option<String>,
}

impl ParsedQuery {
    pub(crate) fn empty(original: String, user_query: String) -> Self {
        Self {
            original,
            user_query,
            ..Self::default()
        }
    }

    /// Whether this is a plain name search rather than a signature search.
    pub fn is_name_search(&self) -> bool {
        self.found_elems == 1 && self.returned.is_empty()
    }

    pub fn all_elements(&self) -> impl Iterator<Item = &QueryElement> {
        self.elems.iter().chain(&self.returned)
    }
}
