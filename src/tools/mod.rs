pub mod list_crates;
pub mod load_index;
pub mod parse_query;
pub mod search;

pub use list_crates::*;
pub use load_index::*;
pub use parse_query::*;
pub use search::*;
