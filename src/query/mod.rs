//! Search query language.
//!
//! A query is a list of names or types, optionally followed by `->` and the
//! types a function should return. See [`parse_query`].

pub mod element;
pub mod error;
pub mod parser;

pub use element::{ParsedQuery, QueryBinding, QueryElement};
pub use error::QueryError;
pub use parser::parse_query;

pub(crate) use error::query_error;
