//! The `list_crates` tool and crate-name suggestions.

use crate::index::SearchIndex;
use crate::state::IndexState;
use rapidfuzz::distance::jaro_winkler;
use rmcp::schemars;
use serde::Deserialize;
use std::fmt::Write as _;

/// Suggestions below this similarity are not worth showing.
const SUGGESTION_THRESHOLD: f64 = 0.8;
const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ListCratesRequest {
    /// Show only crates whose name resembles this one
    #[serde(default)]
    pub name: Option<String>,
}

/// A crate name similar to what the caller typed.
#[derive(Debug, Clone, PartialEq)]
pub struct CrateSuggestion {
    pub name: String,
    pub score: f64,
}

/// Loaded crates similar to `name`, best first.
pub fn suggest_crates(index: &SearchIndex, name: &str) -> Vec<CrateSuggestion> {
    let wanted = name.to_lowercase();
    let mut suggestions: Vec<_> = index
        .crate_names()
        .map(|candidate| CrateSuggestion {
            name: candidate.to_string(),
            score: jaro_winkler::similarity(wanted.chars(), candidate.to_lowercase().chars()),
        })
        .filter(|s| s.score >= SUGGESTION_THRESHOLD)
        .collect();
    suggestions.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

/// Message shown when a crate filter names no loaded crate.
pub fn unknown_crate_message(index: &SearchIndex, name: &str) -> String {
    let mut output = format!("Crate '{name}' is not in the loaded index.\n");
    let suggestions = suggest_crates(index, name);
    if suggestions.is_empty() {
        let names: Vec<_> = index.crate_names().collect();
        let _ = writeln!(output, "\nAvailable crates: {}", names.join(", "));
    } else {
        output.push_str("\nDid you mean one of these?\n");
        for suggestion in suggestions {
            let _ = writeln!(output, "• `{}`", suggestion.name);
        }
    }
    output
}

/// Lists the crates of `index` with their item counts.
pub fn format_crate_list(index: &SearchIndex, request: &ListCratesRequest) -> String {
    if let Some(name) = request.name.as_deref().filter(|n| !n.is_empty())
        && index.crate_data(name).is_none()
    {
        return unknown_crate_message(index, name);
    }

    let mut output = format!("Loaded crates ({}):\n", index.crates().len());
    for data in index.crates() {
        if request.name.as_deref().is_some_and(|n| !n.is_empty() && n != &*data.name) {
            continue;
        }
        // the synthetic crate row is not an item
        let items = data.items.len().saturating_sub(1);
        let _ = write!(output, "  • {} ({items} items)", data.name);
        if let Some(line) = data.doc.lines().map(str::trim).find(|l| !l.is_empty()) {
            let _ = write!(output, " - {line}");
        }
        output.push('\n');
    }
    output
}

pub async fn handle_list_crates(
    state: &IndexState,
    request: ListCratesRequest,
) -> Result<String, String> {
    let loaded = state.active().await?;
    Ok(format_crate_list(&loaded.index, &request))
}
