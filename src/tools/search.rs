//! The `search` tool: runs a query against the active index.

use crate::index::LoadedIndex;
use crate::query::parse_query;
use crate::search::{ResultsTable, SearchOptions, SearchResult, execute};
use crate::state::{IndexState, QueryTicket};
use crate::tools::list_crates::unknown_crate_message;
use rmcp::schemars;
use serde::Deserialize;
use std::fmt::Write as _;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    /// Item name or function signature, e.g. `HashMap`, `vec::new`, `u8 -> String`
    pub query: String,
    /// Only search this crate
    #[serde(default)]
    pub crate_name: Option<String>,
    /// Maximum number of results per category (default: from configuration)
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Parses, executes and ranks `query`, then fetches descriptions for the
/// first `limit` rows of each list.
pub async fn run_search(
    loaded: &LoadedIndex,
    query: &str,
    options: &SearchOptions<'_>,
    limit: usize,
) -> anyhow::Result<ResultsTable> {
    let mut results = execute(&loaded.index, parse_query(query), options);
    results.in_args.truncate(limit);
    results.returned.truncate(limit);
    results.others.truncate(limit);
    results
        .load_descriptions(&loaded.index, &loaded.descriptions)
        .await?;
    Ok(results)
}

pub async fn handle_search(state: &IndexState, request: SearchRequest) -> Result<String, String> {
    let loaded = state.active().await?;
    let ticket = state.begin_query();
    let config = state.config();

    let filter = request
        .crate_name
        .as_deref()
        .or(config.filter_crate.as_deref())
        .filter(|name| !name.is_empty());
    if let Some(name) = filter
        && loaded.index.crate_data(name).is_none()
    {
        return Ok(unknown_crate_message(&loaded.index, name));
    }

    let options = SearchOptions {
        filter_crate: filter,
        ..config.search_options()
    };
    let limit = request.limit.unwrap_or(config.result_limit);
    let results = run_search(&loaded, &request.query, &options, limit)
        .await
        .map_err(|e| format!("Failed to load descriptions: {e}"))?;

    Ok(render_if_current(state, ticket, &results))
}

/// Renders `results`, or only a note when a newer search began after `ticket`.
fn render_if_current(state: &IndexState, ticket: QueryTicket, results: &ResultsTable) -> String {
    if state.is_current(ticket) {
        return format_results(results);
    }
    tracing::debug!(query = %results.query.original, "search superseded by a newer query");
    format!(
        "Search results for `{}` were discarded: a newer search started while this one was running.\n",
        results.query.original
    )
}

/// Renders the three result lists as text.
pub fn format_results(results: &ResultsTable) -> String {
    let query = &results.query;
    let mut output = format!("Search results for `{}`:\n", query.original);

    if let Some(error) = &query.error {
        let _ = writeln!(output, "\nQuery error: {error}");
    }
    if let Some(correction) = &query.correction {
        let _ = writeln!(
            output,
            "\nShowing results for closest type name `{correction}` instead."
        );
    }
    if let (Some(from), Some(to)) = (&query.propose_correction_from, &query.propose_correction_to) {
        let _ = writeln!(
            output,
            "\nType `{from}` not found and used as generic parameter. Consider searching for `{to}` instead."
        );
    }

    if results.is_empty() {
        output.push_str("\nNo results found.\n");
        return output;
    }

    let sections: [(&str, &[SearchResult]); 3] = if query.is_name_search() {
        [
            ("In Names", &results.others),
            ("In Parameters", &results.in_args),
            ("In Return Types", &results.returned),
        ]
    } else {
        [
            ("In Function Signatures", &results.others),
            ("In Parameters", &results.in_args),
            ("In Return Types", &results.returned),
        ]
    };
    for (title, rows) in sections {
        if rows.is_empty() {
            continue;
        }
        let _ = writeln!(output, "\n{title} ({}):", rows.len());
        for (position, row) in rows.iter().enumerate() {
            format_row(&mut output, position + 1, row);
        }
    }
    output
}

fn format_row(output: &mut String, position: usize, row: &SearchResult) {
    let _ = write!(output, "{position}. `{}` ({})", row.full_path, row.ty);
    if let Some(alias) = &row.alias {
        let _ = write!(output, " - see `{alias}`");
    }
    output.push('\n');
    if let Some(first_line) = row
        .desc
        .as_deref()
        .and_then(|desc| desc.lines().map(str::trim).find(|line| !line.is_empty()))
    {
        let _ = writeln!(output, "   {first_line}");
    }
    let _ = writeln!(output, "   {}", row.href);
}
