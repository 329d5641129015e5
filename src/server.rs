//! MCP server exposing search over rustdoc index files.

use crate::config::SearchConfig;
use crate::state::IndexState;
use crate::tools::list_crates::{ListCratesRequest, handle_list_crates};
use crate::tools::load_index::{LoadIndexRequest, handle_load_index};
use crate::tools::parse_query::{ParseQueryRequest, handle_parse_query};
use crate::tools::search::{SearchRequest, handle_search};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars::{self, JsonSchema, generate::SchemaSettings},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

/// MCP server answering rustdoc search queries.
#[derive(Clone)]
pub struct SearchServer {
    state: Arc<IndexState>,
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for SearchServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchServer")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[tool_router]
impl SearchServer {
    pub fn new(config: SearchConfig) -> Self {
        Self::with_state(Arc::new(IndexState::new(config)))
    }

    pub fn with_state(state: Arc<IndexState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }

    pub fn state(&self) -> &Arc<IndexState> {
        &self.state
    }

    #[tool(
        description = "Search Rust API documentation by item name or by function signature. Accepts names ('HashMap', 'vec::new'), type filters ('fn:parse', 'struct:Vec'), and signatures ('u8 -> String', 'Vec<T>, usize -> T', 'Iterator<Item=u32> -> u32'). Returns name matches, functions taking the type, and functions returning it.",
        input_schema = inline_schema_for_type::<SearchRequest>()
    )]
    async fn search(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> std::result::Result<String, String> {
        handle_search(&self.state, request).await
    }

    #[tool(
        description = "Parse a search query without running it. Shows how names, paths, generics, associated type bindings and type filters are understood, or the syntax error.",
        input_schema = inline_schema_for_type::<ParseQueryRequest>()
    )]
    fn parse_query(
        &self,
        Parameters(request): Parameters<ParseQueryRequest>,
    ) -> std::result::Result<String, String> {
        handle_parse_query(&request)
    }

    #[tool(
        description = "Load a rustdoc search index file and make it the index searched by default. Files are cached and rebuilt only when their contents change.",
        input_schema = inline_schema_for_type::<LoadIndexRequest>()
    )]
    async fn load_index(
        &self,
        Parameters(request): Parameters<LoadIndexRequest>,
    ) -> std::result::Result<String, String> {
        handle_load_index(&self.state, request).await
    }

    #[tool(
        description = "List the crates of the loaded index with item counts. With a name, checks that crate and suggests similar names when it is missing.",
        input_schema = inline_schema_for_type::<ListCratesRequest>()
    )]
    async fn list_crates(
        &self,
        Parameters(request): Parameters<ListCratesRequest>,
    ) -> std::result::Result<String, String> {
        handle_list_crates(&self.state, request).await
    }
}

#[tool_handler]
impl ServerHandler for SearchServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_protocol_version(ProtocolVersion::V_2024_11_05)
            .with_server_info(Implementation::from_build_env())
            .with_instructions(
                "rustdoc-search: rustdoc's search engine over prebuilt search index files. \
                 Use load_index to pick an index file (unless one is configured), then search \
                 by name or by signature. parse_query explains how a query is read."
                    .to_string(),
            )
    }
}

/// Generate an inline JSON schema for MCP tools
///
/// Unlike rmcp's default `schema_for_type()`, this sets `inline_subschemas = true`
/// so enums are inlined instead of referenced through `$ref`.
pub fn inline_schema_for_type<T: JsonSchema>() -> Arc<JsonObject> {
    let mut settings = SchemaSettings::draft07();
    settings.transforms = vec![Box::new(schemars::transform::AddNullable::default())];
    settings.inline_subschemas = true;

    let generator = settings.into_generator();
    let schema = generator.into_root_schema_for::<T>();
    let object = match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(object)) => object,
        Ok(other) => {
            tracing::error!(schema = %other, "tool schema is not a JSON object");
            JsonObject::new()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize tool schema");
            JsonObject::new()
        }
    };
    Arc::new(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn request_schemas_are_objects() {
        let schema = inline_schema_for_type::<SearchRequest>();
        check!(schema.get("type").and_then(|t| t.as_str()) == Some("object"));
        let_assert!(Some(properties) = schema.get("properties").and_then(|p| p.as_object()));
        check!(properties.contains_key("query"));
        check!(properties.contains_key("crate_name"));
        check!(properties.contains_key("limit"));
    }

    #[test]
    fn advertises_tools() {
        let server = SearchServer::new(SearchConfig::default());
        let info = server.get_info();
        check!(info.capabilities.tools.is_some());
        let names: Vec<_> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        for expected in ["search", "parse_query", "load_index", "list_crates"] {
            check!(names.contains(&expected.to_string()));
        }
    }
}
