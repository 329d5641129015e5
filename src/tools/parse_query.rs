//! The `parse_query` tool: shows how a query is understood.

use crate::query::{ParsedQuery, QueryElement, parse_query};
use rmcp::schemars;
use serde::Deserialize;
use std::fmt::Write as _;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ParseQueryRequest {
    /// Query text to parse
    pub query: String,
    /// Return the parse as JSON instead of an outline
    #[serde(default)]
    pub json: bool,
}

pub fn handle_parse_query(request: &ParseQueryRequest) -> Result<String, String> {
    let parsed = parse_query(&request.query);
    if request.json {
        return serde_json::to_string_pretty(&parsed).map_err(|e| e.to_string());
    }
    Ok(format_parsed(&parsed))
}

/// Renders a parsed query as an indented outline.
pub fn format_parsed(parsed: &ParsedQuery) -> String {
    let mut output = format!("Query `{}`\n", parsed.original);
    if let Some(error) = &parsed.error {
        let _ = writeln!(output, "Error: {error}");
        return output;
    }
    let kind = if parsed.is_name_search() {
        "name search"
    } else {
        "signature search"
    };
    let _ = writeln!(
        output,
        "Kind: {kind}{}",
        if parsed.literal_search { " (exact)" } else { "" }
    );
    if !parsed.elems.is_empty() {
        output.push_str("Arguments:\n");
        for elem in &parsed.elems {
            format_element(&mut output, elem, 1);
        }
    }
    if !parsed.returned.is_empty() {
        output.push_str("Returns:\n");
        for elem in &parsed.returned {
            format_element(&mut output, elem, 1);
        }
    }
    output
}

fn format_element(output: &mut String, elem: &QueryElement, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(output, "{indent}- {}", elem.full_path.join("::"));
    if let Some(filter) = elem.type_filter {
        let _ = write!(output, " [{filter}]");
    }
    output.push('\n');
    for generic in &elem.generics {
        format_element(output, generic, depth + 1);
    }
    for binding in &elem.bindings {
        let _ = writeln!(output, "{indent}  {} =", binding.name);
        for constraint in &binding.constraints {
            format_element(output, constraint, depth + 2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn outlines_arguments_and_returns() {
        let_assert!(
            Ok(text) = handle_parse_query(&ParseQueryRequest {
                query: "fn:std::vec::Vec<u8>, u8 -> bool".into(),
                json: false,
            })
        );
        check!(text.contains("Kind: signature search (exact)"));
        check!(text.contains("  - std::vec::vec [fn]\n    - u8\n"));
        check!(text.contains("Returns:\n  - bool\n"));
    }

    #[test]
    fn renders_errors_with_highlighted_fragments() {
        let_assert!(
            Ok(text) = handle_parse_query(&ParseQueryRequest {
                query: "vec<u8".into(),
                json: false,
            })
        );
        check!(text.contains("Error: Unclosed `<`"));
    }

    #[test]
    fn json_output() {
        let_assert!(
            Ok(text) = handle_parse_query(&ParseQueryRequest {
                query: "iterator<item=u32>".into(),
                json: true,
            })
        );
        let_assert!(Ok(value) = serde_json::from_str::<serde_json::Value>(&text));
        check!(value["elems"][0]["bindings"][0]["name"] == "item");
        check!(value["found_elems"] == 1);
    }
}
