//! The `load_index` tool: selects the index file searched by default.

use crate::index::LoadedIndex;
use crate::state::IndexState;
use rmcp::schemars;
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LoadIndexRequest {
    /// Path to a search index file (`~` is expanded)
    pub path: String,
}

pub async fn handle_load_index(
    state: &IndexState,
    request: LoadIndexRequest,
) -> Result<String, String> {
    let previous = state.active().await.ok();
    let loaded = state
        .activate(Path::new(&request.path))
        .await
        .map_err(|e| format!("Failed to load index: {e}"))?;
    let changed = previous.is_none_or(|p| p.path != loaded.path || p.digest != loaded.digest);
    Ok(format_response(&loaded, changed))
}

pub fn format_response(loaded: &LoadedIndex, changed: bool) -> String {
    let index = &loaded.index;
    let mut output = format!("Index: {}\n", loaded.path.display());
    if !changed {
        output.push_str("(unchanged)\n");
    }
    let _ = writeln!(
        output,
        "{} crates, {} items, {} type names",
        index.crates().len(),
        index.items().len(),
        index.names().len()
    );
    let names: Vec<_> = index.crate_names().collect();
    if !names.is_empty() {
        let _ = writeln!(output, "Crates: {}", names.join(", "));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use assert2::{check, let_assert};

    const INDEX: &str = r#"{"crates": [["demo", {"t": "H", "n": ["run"], "q": [[0, "demo"]], "i": [0], "D": "d", "f": "`"}]]}"#;

    #[tokio::test]
    async fn switches_the_active_index() {
        let_assert!(Ok(dir) = tempfile::tempdir());
        let path = dir.path().join("index.json");
        let_assert!(Ok(()) = std::fs::write(&path, INDEX));
        let state = IndexState::new(SearchConfig::default());

        let request = LoadIndexRequest {
            path: path.display().to_string(),
        };
        let_assert!(Ok(text) = handle_load_index(&state, request).await);
        check!(text.contains("1 crates, 2 items"));
        check!(text.contains("Crates: demo"));
        check!(!text.contains("(unchanged)"));

        let request = LoadIndexRequest {
            path: path.display().to_string(),
        };
        let_assert!(Ok(text) = handle_load_index(&state, request).await);
        check!(text.contains("(unchanged)"));
        let_assert!(Ok(active) = state.active().await);
        check!(active.path == path);
    }

    #[tokio::test]
    async fn reports_missing_files() {
        let state = IndexState::new(SearchConfig::default());
        let request = LoadIndexRequest {
            path: "/nonexistent/index.json".into(),
        };
        let_assert!(Err(e) = handle_load_index(&state, request).await);
        check!(e.starts_with("Failed to load index:"));
    }
}
