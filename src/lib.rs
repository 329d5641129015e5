//! rustdoc's search engine as a library.
//!
//! [`index`] decodes the search payload rustdoc emits, [`query`] parses the
//! search language, and [`search::execute`] answers a parsed query with three
//! ranked result lists. [`server`] wraps all of it in an MCP server.

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod search;
pub mod server;
pub mod state;
pub mod tools;
pub mod tracing;

pub use config::SearchConfig;
pub use index::{LoadedIndex, SearchIndex, build_index};
pub use query::{ParsedQuery, parse_query};
pub use search::{ResultsTable, SearchOptions, SearchResult, execute};
pub use server::SearchServer;
