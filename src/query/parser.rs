//! Recursive-descent parser for search queries.
//!
//! The parser walks the lowercased query with a byte cursor. Elements are first
//! collected as [`RawElem`]s, which still carry the textual type filter and any
//! pending `name=` binding, then converted to [`QueryElement`]s once the whole
//! query parsed. The first syntax error aborts parsing.

use super::element::{ParsedQuery, QueryBinding, QueryElement};
use super::error::{QueryError, query_error};
use crate::index::{ItemType, TypeRef};
use regex::Regex;
use std::sync::LazyLock;

static IDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\p{ID_Start}\p{ID_Continue}*|_\p{ID_Continue}+)").expect("valid identifier regex")
});
static PATH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:::\s*)|(?:\s+(?:::\s*)?)").expect("valid path regex"));
static QUADCOLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"::\s*::").expect("valid regex"));
static INVALID_TYPE_FILTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[^a-z]").expect("valid regex"));

type ParseResult<T> = Result<T, QueryError>;

fn is_special_start(c: char) -> bool {
    matches!(c, '<' | '"')
}

fn is_end_character(c: char) -> bool {
    matches!(c, '=' | ',' | '>' | '-' | ']' | ')')
}

fn is_separator(c: char) -> bool {
    matches!(c, ',' | '=')
}

fn is_path_separator(c: char) -> bool {
    matches!(c, ':' | ' ')
}

/// A `name=` seen inside a generics list, waiting for its value.
#[derive(Debug, Clone)]
struct PendingBinding {
    name: String,
    generics: Vec<RawElem>,
}

/// Element as produced by the grammar, before type filters are checked.
#[derive(Debug, Clone)]
struct RawElem {
    /// `None` only for the implicit output of `name(args)` without an arrow.
    name: Option<String>,
    full_path: Vec<String>,
    path_without_last: Vec<String>,
    path_last: String,
    generics: Vec<RawElem>,
    bindings: Vec<(String, Vec<RawElem>)>,
    type_filter: Option<String>,
    binding_name: Option<PendingBinding>,
}

impl RawElem {
    fn primitive(name: &str, type_filter: Option<&str>) -> Self {
        Self {
            name: Some(name.to_string()),
            full_path: vec![name.to_string()],
            path_without_last: Vec::new(),
            path_last: name.to_string(),
            generics: Vec::new(),
            bindings: Vec::new(),
            type_filter: type_filter.map(str::to_string),
            binding_name: None,
        }
    }

    fn output_binding() -> PendingBinding {
        PendingBinding {
            name: "output".to_string(),
            generics: Vec::new(),
        }
    }

    /// Stand-in for a missing closure output; carries only the binding.
    fn output_placeholder() -> Self {
        Self {
            name: None,
            full_path: Vec::new(),
            path_without_last: Vec::new(),
            path_last: String::new(),
            generics: Vec::new(),
            bindings: Vec::new(),
            type_filter: None,
            binding_name: Some(Self::output_binding()),
        }
    }

    fn has_generics(&self) -> bool {
        !self.generics.is_empty()
    }

    /// Resolves the textual type filters of this element and its children.
    fn into_element(self) -> ParseResult<QueryElement> {
        let type_filter = match self.type_filter {
            None => None,
            Some(name) => Some(
                ItemType::from_filter_name(&name)
                    .ok_or_else(|| query_error!["Unknown type filter ", name])?,
            ),
        };
        let generics = convert_all(self.generics)?;
        let bindings = self
            .bindings
            .into_iter()
            .map(|(name, constraints)| {
                Ok(QueryBinding {
                    name,
                    id: None,
                    constraints: convert_all(constraints)?,
                })
            })
            .collect::<ParseResult<_>>()?;
        let normalized_path_last = self.path_last.replace('_', "");
        Ok(QueryElement {
            name: self.name.unwrap_or_default(),
            id: TypeRef::Wildcard,
            full_path: self.full_path,
            path_without_last: self.path_without_last,
            path_last: self.path_last,
            normalized_path_last,
            generics,
            bindings,
            type_filter,
        })
    }
}

fn convert_all(elems: Vec<RawElem>) -> ParseResult<Vec<QueryElement>> {
    elems
        .into_iter()
        .filter(|e| e.name.is_some())
        .map(RawElem::into_element)
        .collect()
}

struct ParserState<'q> {
    query: &'q str,
    /// Byte offset; may run one past the end after a closing delimiter.
    pos: usize,
    total_elems: usize,
    generics_elems: usize,
    type_filter: Option<String>,
    is_in_binding: Option<PendingBinding>,
    literal_search: bool,
    /// Whether the last top-level element has generics.
    last_elem_generic: bool,
}

impl<'q> ParserState<'q> {
    fn new(query: &'q str) -> Self {
        Self {
            query,
            pos: 0,
            total_elems: 0,
            generics_elems: 0,
            type_filter: None,
            is_in_binding: None,
            literal_search: false,
            last_elem_generic: false,
        }
    }

    fn len(&self) -> usize {
        self.query.len()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.len()
    }

    fn peek(&self) -> Option<char> {
        self.char_at(self.pos)
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        self.query.get(pos..)?.chars().next()
    }

    /// Text of the current character, empty at the end of input.
    fn current(&self) -> String {
        self.peek().map(String::from).unwrap_or_default()
    }

    fn prev_char(&self) -> Option<char> {
        self.query
            .get(..self.pos.min(self.len()))?
            .chars()
            .next_back()
    }

    fn advance(&mut self) {
        self.pos += self.peek().map_or(1, char::len_utf8);
    }

    fn starts_with(&self, s: &str) -> bool {
        self.query.get(self.pos..).is_some_and(|rest| rest.starts_with(s))
    }

    fn is_path_start(&self) -> bool {
        self.starts_with("::")
    }

    fn is_return_arrow(&self) -> bool {
        self.starts_with("->")
    }

    fn skip_whitespace(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    /// Whether the nearest non-space character before the cursor is `c`.
    fn prev_is(&self, c: char) -> bool {
        let before = self.query.get(..self.pos.min(self.len())).unwrap_or("");
        before.trim_end_matches(' ').ends_with(c)
    }

    fn is_last_elem_generic(&self) -> bool {
        self.last_elem_generic || self.prev_is('>')
    }

    fn consume_ident(&mut self) -> bool {
        let Some(rest) = self.query.get(self.pos..) else {
            return false;
        };
        match IDENT.find(rest) {
            Some(m) => {
                self.pos += m.end();
                true
            }
            None => false,
        }
    }

    fn text(&self, start: usize, end: usize) -> &'q str {
        if start >= end {
            return "";
        }
        self.query.get(start..end).unwrap_or("")
    }

    /// Parses the whole query into its top-level and returned elements.
    fn parse_input(&mut self) -> ParseResult<(Vec<RawElem>, Vec<RawElem>)> {
        let mut elems = Vec::new();
        let mut found_stop_char = true;
        while let Some(c) = self.peek() {
            if is_end_character(c) {
                found_stop_char = true;
                if is_separator(c) {
                    self.advance();
                    continue;
                } else if c == '-' || c == '>' {
                    if self.is_return_arrow() {
                        break;
                    }
                    return Err(query_error!["Unexpected ", c, " (did you mean ", "->", "?)"]);
                } else if let Some(prev) = self.prev_char() {
                    return Err(query_error!["Unexpected ", c, " after ", prev]);
                }
                return Err(query_error!["Unexpected ", c]);
            } else if c == ' ' {
                self.skip_whitespace();
                continue;
            }
            if !found_stop_char {
                return Err(self.expected_separator(c, None, true)?);
            }
            let before = elems.len();
            self.get_filtered_next_elem(&mut elems, false)?;
            self.last_elem_generic = elems.last().is_some_and(RawElem::has_generics);
            if elems.len() == before {
                self.advance();
            }
            found_stop_char = false;
        }
        if let Some(filter) = &self.type_filter {
            return Err(query_error![
                "Unexpected ",
                ":",
                " (expected path after type filter ",
                format!("{filter}:"),
                ")",
            ]);
        }
        let mut returned = Vec::new();
        while !self.at_end() {
            if self.is_return_arrow() {
                self.pos += 2;
                self.skip_whitespace();
                self.get_items_before(&mut returned, None)?;
                if returned.is_empty() {
                    return Err(query_error!["Expected at least one item after ", "->"]);
                }
                break;
            }
            self.advance();
        }
        Ok((elems, returned))
    }

    /// Error for two elements written without a separator between them.
    ///
    /// Returns `Err` directly when the real problem is a second quoted element.
    fn expected_separator(
        &self,
        found: char,
        end_char: Option<char>,
        top_level: bool,
    ) -> ParseResult<QueryError> {
        let mut fragments: Vec<String> = vec!["Expected ".into(), ",".into()];
        if top_level {
            if self.type_filter.is_some() {
                fragments.extend([" or ".into(), "->".into()]);
            } else {
                fragments.extend([", ".into(), ":".into(), " or ".into(), "->".into()]);
            }
        } else if let Some(end) = end_char {
            fragments.extend([", ".into(), "=".into(), ", or ".into(), end.to_string()]);
        } else {
            fragments.extend([" or ".into(), "=".into()]);
        }
        if self.is_last_elem_generic() {
            fragments.extend([" after ".into(), ">".into()]);
        } else if self.prev_is('"') {
            return Err(query_error!["Cannot have more than one element if you use quotes"]);
        }
        fragments.extend([", found ".into(), found.to_string()]);
        Ok(QueryError::new(fragments))
    }

    fn get_filtered_next_elem(&mut self, elems: &mut Vec<RawElem>, in_generics: bool) -> ParseResult<()> {
        let start = self.pos;
        if self.peek() == Some(':') && !self.is_path_start() {
            return Err(query_error!["Expected type filter before ", ":"]);
        }
        self.get_next_elem(elems, in_generics)?;
        if self.peek() == Some(':') && !self.is_path_start() {
            if let Some(filter) = &self.type_filter {
                return Err(query_error![
                    "Unexpected ",
                    ":",
                    " (expected path after type filter ",
                    format!("{filter}:"),
                    ")",
                ]);
            }
            let Some(filter_elem) = elems.pop() else {
                return Err(query_error!["Expected type filter before ", ":"]);
            };
            if self.literal_search {
                return Err(query_error!["Cannot use quotes on type filter"]);
            }
            self.check_extra_type_filter_characters(start)?;
            self.type_filter = Some(filter_elem.name.unwrap_or_default());
            self.pos += 1;
            self.total_elems = self.total_elems.saturating_sub(1);
            self.literal_search = false;
            self.get_next_elem(elems, in_generics)?;
        }
        Ok(())
    }

    fn check_extra_type_filter_characters(&self, start: usize) -> ParseResult<()> {
        let filter = self.text(start, self.pos).trim();
        if let Some(m) = INVALID_TYPE_FILTER.find(filter) {
            return Err(query_error![
                "Unexpected ",
                m.as_str(),
                " in type filter (before ",
                ":",
                ")",
            ]);
        }
        Ok(())
    }

    fn get_next_elem(&mut self, elems: &mut Vec<RawElem>, in_generics: bool) -> ParseResult<()> {
        self.skip_whitespace();
        match self.peek() {
            Some(open @ ('[' | '(')) => self.get_bracketed_elem(open, elems, in_generics),
            Some('&') => self.get_reference_elem(elems, in_generics),
            _ => self.get_named_elem(elems, in_generics),
        }
    }

    /// `(...)` tuples and `[...]` slices. A lone parenthesised element unwraps.
    fn get_bracketed_elem(&mut self, open: char, elems: &mut Vec<RawElem>, in_generics: bool) -> ParseResult<()> {
        let (end_char, name, friendly) = if open == '[' {
            (']', "[]", "slice")
        } else {
            (')', "()", "tuple")
        };
        self.pos += 1;
        let mut generics = Vec::new();
        let found_separator = self.get_items_before(&mut generics, Some(end_char))?;
        let type_filter = self.type_filter.take();
        let binding_name = self.is_in_binding.take();
        if generics.iter().any(|g| g.binding_name.is_some()) {
            return Err(query_error!["Type parameter ", "=", format!(" cannot be within {friendly} "), name]);
        }
        let is_tuple = name == "()";
        if is_tuple && !found_separator && generics.len() == 1 && type_filter.is_none() {
            let mut elem = generics.remove(0);
            elem.binding_name = binding_name;
            elems.push(elem);
        } else if is_tuple && generics.len() == 1 && generics[0].name.as_deref() == Some("->") {
            // `primitive:(a -> b)` is the arrow itself, not a tuple holding it
            let mut elem = generics.remove(0);
            elem.type_filter = type_filter;
            elem.binding_name = binding_name;
            elems.push(elem);
        } else {
            if let Some(filter) = type_filter.as_deref()
                && filter != "primitive"
            {
                return Err(query_error![
                    "Invalid search type: primitive ",
                    name,
                    " and ",
                    filter,
                    " both specified",
                ]);
            }
            self.count_elem(in_generics);
            let mut elem = RawElem::primitive(name, Some("primitive"));
            elem.generics = generics;
            elem.binding_name = binding_name;
            elems.push(elem);
        }
        Ok(())
    }

    /// `&T` and `&mut T`.
    fn get_reference_elem(&mut self, elems: &mut Vec<RawElem>, in_generics: bool) -> ParseResult<()> {
        if let Some(filter) = self.type_filter.as_deref()
            && filter != "primitive"
        {
            return Err(query_error![
                "Invalid search type: primitive ",
                "&",
                " and ",
                filter,
                " both specified",
            ]);
        }
        self.type_filter = None;
        let binding_name = self.is_in_binding.take();
        self.pos += 1;
        self.skip_whitespace();
        let mut generics = Vec::new();
        if self.starts_with("mut")
            && !self
                .char_at(self.pos + 3)
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            generics.push(RawElem::primitive("mut", Some("keyword")));
            self.pos += 3;
        }
        self.skip_whitespace();
        if let Some(c) = self.peek()
            && !is_end_character(c)
        {
            self.get_filtered_next_elem(&mut generics, in_generics)?;
        }
        let mut elem = RawElem::primitive("reference", Some("primitive"));
        elem.generics = generics;
        elem.binding_name = binding_name;
        elems.push(elem);
        Ok(())
    }

    /// Identifiers and paths, quoted names, their generics and closure syntax,
    /// and the key half of a `key=value` binding.
    fn get_named_elem(&mut self, elems: &mut Vec<RawElem>, in_generics: bool) -> ParseResult<()> {
        let mut start = self.pos;
        let is_string_elem = self.peek() == Some('"');
        let end = if is_string_elem {
            start += 1;
            self.get_string_elem(in_generics)?;
            self.pos - 1
        } else {
            self.get_ident_end_position()?
        };

        let mut generics = Vec::new();
        match self.peek() {
            Some('<') => {
                if start >= end {
                    return Err(query_error!["Found generics without a path"]);
                }
                self.pos += 1;
                self.get_items_before(&mut generics, Some('>'))?;
            }
            Some('(') => {
                if start >= end {
                    return Err(query_error!["Found generics without a path"]);
                }
                if self.is_in_binding.is_some() {
                    return Err(query_error!["Unexpected ", "(", " after ", "="]);
                }
                self.pos += 1;
                let type_filter = self.type_filter.take();
                self.get_items_before(&mut generics, Some(')'))?;
                self.skip_whitespace();
                if self.is_return_arrow() {
                    self.pos += 2;
                    self.skip_whitespace();
                    let before = generics.len();
                    self.get_filtered_next_elem(&mut generics, in_generics)?;
                    let grew = generics.len() > before;
                    match generics.last_mut() {
                        Some(output) if grew => {
                            output.binding_name = Some(RawElem::output_binding());
                        }
                        _ => return Err(query_error!["Expected at least one item after ", "->"]),
                    }
                } else {
                    generics.push(RawElem::output_placeholder());
                }
                self.type_filter = type_filter;
            }
            _ => {}
        }
        if is_string_elem {
            self.skip_whitespace();
        }
        if start >= end && generics.is_empty() {
            return Ok(());
        }
        if self.peek() == Some('=') {
            if self.is_in_binding.is_some() {
                return Err(query_error!["Cannot write ", "=", " twice in a binding"]);
            }
            if !in_generics {
                return Err(query_error!["Type parameter ", "=", " must be within generics list"]);
            }
            let name = self.text(start, end).trim();
            if name == "!" {
                return Err(query_error!["Type parameter ", "=", " key cannot be ", "!", " never type"]);
            }
            if name.contains('!') {
                return Err(query_error!["Type parameter ", "=", " key cannot be ", "!", " macro"]);
            }
            if name.contains("::") {
                return Err(query_error!["Type parameter ", "=", " key cannot contain ", "::", " path"]);
            }
            if name.contains(':') {
                return Err(query_error!["Type parameter ", "=", " key cannot contain ", ":", " type"]);
            }
            self.is_in_binding = Some(PendingBinding {
                name: name.to_string(),
                generics,
            });
        } else {
            let name = self.text(start, end);
            let elem = self.create_query_element(name, generics, in_generics)?;
            elems.push(elem);
        }
        Ok(())
    }

    fn get_string_elem(&mut self, in_generics: bool) -> ParseResult<()> {
        if in_generics {
            return Err(query_error!["Unexpected ", "\"", " in generics"]);
        } else if self.literal_search {
            return Err(query_error!["Cannot have more than one literal search element"]);
        } else if self.total_elems > self.generics_elems {
            return Err(query_error!["Cannot use literal search when there is more than one element"]);
        }
        self.pos += 1;
        let start = self.pos;
        let end = self.get_ident_end_position()?;
        if self.at_end() {
            return Err(query_error!["Unclosed ", "\""]);
        }
        match self.char_at(end) {
            Some('"') => {}
            other => {
                return Err(query_error![
                    "Unexpected ",
                    other.map(String::from).unwrap_or_default(),
                    " in a string element",
                ]);
            }
        }
        if start == end {
            return Err(query_error!["Cannot have empty string element"]);
        }
        self.pos += 1;
        self.literal_search = true;
        Ok(())
    }

    /// Moves past an identifier path and returns where its name ends.
    ///
    /// A trailing `!` marks a macro: it is excluded from the name and sets the
    /// `macro` type filter.
    fn get_ident_end_position(&mut self) -> ParseResult<usize> {
        let mut after_ident = self.consume_ident();
        let mut end = self.pos;
        let mut macro_exclamation = None;
        while let Some(c) = self.peek() {
            if c == '!' {
                if macro_exclamation.is_some() {
                    return Err(query_error!["Cannot have more than one ", "!", " in an ident"]);
                } else if self.pos + 1 < self.len() {
                    let pos = self.pos;
                    self.pos += 1;
                    let before_ident = self.consume_ident();
                    self.pos = pos;
                    if before_ident {
                        return Err(query_error!["Unexpected ", "!", ": it can only be at the end of an ident"]);
                    }
                }
                if after_ident {
                    macro_exclamation = Some(self.pos);
                }
            } else if is_path_separator(c) {
                if c == ':' {
                    if !self.is_path_start() {
                        break;
                    }
                    self.pos += 1;
                } else {
                    while self.char_at(self.pos + 1) == Some(' ') {
                        self.pos += 1;
                    }
                }
                if macro_exclamation.is_some() {
                    return Err(query_error!["Cannot have associated items in macros"]);
                }
            } else if c == '[' || c == '(' || is_end_character(c) || is_special_start(c) || is_separator(c) {
                break;
            } else if let Some(prev) = self.prev_char() {
                return Err(query_error!["Unexpected ", c, " after ", prev, " (not a valid identifier)"]);
            } else {
                return Err(query_error!["Unexpected ", c, " (not a valid identifier)"]);
            }
            self.advance();
            after_ident = self.consume_ident();
            end = self.pos;
        }
        if let Some(exclamation) = macro_exclamation {
            match self.type_filter.as_deref() {
                None => self.type_filter = Some("macro".to_string()),
                Some("macro") => {}
                Some(filter) => {
                    return Err(query_error![
                        "Invalid search type: macro ",
                        "!",
                        " and ",
                        filter,
                        " both specified",
                    ]);
                }
            }
            end = exclamation;
        }
        Ok(end)
    }

    fn count_elem(&mut self, in_generics: bool) {
        self.total_elems += 1;
        if in_generics {
            self.generics_elems += 1;
        }
    }

    fn create_query_element(
        &mut self,
        name: &str,
        generics: Vec<RawElem>,
        in_generics: bool,
    ) -> ParseResult<RawElem> {
        let path = name.trim();
        if path.is_empty() && generics.is_empty() {
            return Err(query_error!["Unexpected ", self.current()]);
        }
        if self.literal_search && self.total_elems > self.generics_elems {
            return Err(query_error!["Cannot have more than one element if you use quotes"]);
        }
        let type_filter = self.type_filter.take();
        if name == "!" {
            if let Some(filter) = type_filter.as_deref()
                && filter != "primitive"
            {
                return Err(query_error![
                    "Invalid search type: primitive never type ",
                    "!",
                    " and ",
                    filter,
                    " both specified",
                ]);
            }
            if !generics.is_empty() {
                return Err(query_error!["Never type ", "!", " does not accept generic parameters"]);
            }
            let mut elem = RawElem::primitive("never", Some("primitive"));
            elem.binding_name = self.is_in_binding.take();
            return Ok(elem);
        }
        if path.starts_with("::") {
            return Err(query_error!["Paths cannot start with ", "::"]);
        } else if path.ends_with("::") {
            return Err(query_error!["Paths cannot end with ", "::"]);
        } else if let Some(m) = QUADCOLON.find(path) {
            return Err(query_error!["Unexpected ", m.as_str()]);
        }
        let mut segments: Vec<String> = PATH_SEPARATOR.split(path).map(str::to_string).collect();
        if segments.is_empty() || (segments.len() == 1 && segments[0].is_empty()) {
            if !generics.is_empty() || self.prev_is('>') {
                return Err(query_error!["Found generics without a path"]);
            }
            return Err(query_error!["Unexpected ", self.current()]);
        }
        for (i, segment) in segments.iter_mut().enumerate() {
            if segment == "!" {
                if i != 0 {
                    return Err(query_error!["Never type ", "!", " is not associated item"]);
                }
                *segment = "never".to_string();
            }
        }
        self.count_elem(in_generics);
        let binding_name = self.is_in_binding.take();

        // bindings are parsed as generics; split them out
        let mut plain = Vec::with_capacity(generics.len());
        let mut bindings: Vec<(String, Vec<RawElem>)> = Vec::new();
        for mut generic in generics {
            let Some(binding) = generic.binding_name.take() else {
                plain.push(generic);
                continue;
            };
            let mut constraints = binding.generics;
            if generic.name.is_some() {
                constraints.insert(0, generic);
            }
            match bindings.iter_mut().find(|(key, _)| *key == binding.name) {
                Some(existing) => existing.1 = constraints,
                None => bindings.push((binding.name, constraints)),
            }
        }

        let path_last = segments.last().cloned().unwrap_or_default();
        let path_without_last = segments[..segments.len() - 1].to_vec();
        Ok(RawElem {
            name: Some(path.to_string()),
            full_path: segments,
            path_without_last,
            path_last,
            generics: plain,
            bindings,
            type_filter,
            binding_name,
        })
    }

    /// Parses elements until `end_char`, or to the end of input when `None`.
    ///
    /// Returns whether a `,` or `=` separator was seen. An `->` inside a
    /// delimited list turns the list into a function-like `->` element.
    fn get_items_before(&mut self, elems: &mut Vec<RawElem>, end_char: Option<char>) -> ParseResult<bool> {
        let mut found_stop_char = true;
        let mut found_separator = false;

        let old_type_filter = self.type_filter.take();
        let old_is_in_binding = self.is_in_binding.take();

        let mut hof_parameters: Option<Vec<RawElem>> = None;
        let extra = match end_char {
            Some('>') => "<".to_string(),
            Some(']') => "[".to_string(),
            Some(')') => "(".to_string(),
            Some(c) => c.to_string(),
            None => "->".to_string(),
        };

        while let Some(c) = self.peek() {
            if Some(c) == end_char {
                if self.is_in_binding.is_some() {
                    return Err(query_error!["Unexpected ", c, " after ", "="]);
                }
                break;
            } else if end_char.is_some() && self.is_return_arrow() {
                if self.is_in_binding.is_some() {
                    return Err(query_error!["Unexpected ", "->", " after ", "="]);
                }
                hof_parameters = Some(std::mem::take(elems));
                self.pos += 2;
                found_stop_char = true;
                found_separator = false;
                continue;
            } else if c == ' ' {
                self.pos += 1;
                continue;
            } else if is_separator(c) {
                self.pos += 1;
                found_stop_char = true;
                found_separator = true;
                continue;
            } else if c == ':' && self.is_path_start() {
                return Err(query_error!["Unexpected ", "::", ": paths cannot start with ", "::"]);
            } else if is_end_character(c) {
                return Err(query_error!["Unexpected ", c, " after ", extra]);
            }
            if !found_stop_char {
                return Err(self.expected_separator(c, end_char, false)?);
            }
            let pos_before = self.pos;
            self.get_filtered_next_elem(elems, end_char.is_some())?;
            if end_char.is_some() && self.at_end() {
                return Err(query_error!["Unclosed ", extra]);
            }
            if pos_before == self.pos {
                self.advance();
            }
            found_stop_char = false;
        }
        if self.at_end() && end_char.is_some() {
            return Err(query_error!["Unclosed ", extra]);
        }
        // step over the end character, or past the end of input
        self.pos += 1;

        if let Some(parameters) = hof_parameters {
            found_separator = false;
            if elems.iter().chain(&parameters).any(|e| e.binding_name.is_some())
                || self.is_in_binding.is_some()
            {
                return Err(query_error!["Unexpected ", "=", " within ", "->"]);
            }
            let mut hof = RawElem::primitive("->", None);
            hof.generics = parameters;
            hof.bindings = vec![("output".to_string(), std::mem::take(elems))];
            elems.push(hof);
        }

        self.type_filter = old_type_filter;
        self.is_in_binding = old_is_in_binding;
        Ok(found_separator)
    }
}

/// Parses a search query.
///
/// Carriage returns, newlines and tabs count as spaces. On a syntax error the
/// result is an empty query carrying only the error and the query text.
pub fn parse_query(input: &str) -> ParsedQuery {
    let original = input.trim().replace(['\r', '\n', '\t'], " ");
    let user_query = original.to_lowercase();

    let (parsed, total_elems, literal_search) = {
        let mut state = ParserState::new(&user_query);
        let parsed = state
            .parse_input()
            .and_then(|(elems, returned)| Ok((convert_all(elems)?, convert_all(returned)?)));
        (parsed, state.total_elems, state.literal_search)
    };

    match parsed {
        Err(error) => {
            tracing::debug!(query = %original, %error, "query failed to parse");
            ParsedQuery {
                error: Some(error),
                ..ParsedQuery::empty(original, user_query)
            }
        }
        Ok((elems, returned)) => ParsedQuery {
            found_elems: elems.len() + returned.len(),
            total_elems,
            literal_search: literal_search || total_elems > 1,
            elems,
            returned,
            ..ParsedQuery::empty(original, user_query)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    fn parse_ok(input: &str) -> ParsedQuery {
        let query = parse_query(input);
        check!(query.error.is_none(), "unexpected error for {input:?}: {:?}", query.error);
        query
    }

    fn fragments(input: &str) -> Vec<String> {
        let query = parse_query(input);
        let_assert!(Some(error) = query.error);
        check!(query.elems.is_empty());
        check!(query.returned.is_empty());
        check!(query.found_elems == 0);
        error.fragments().to_vec()
    }

    #[test]
    fn plain_non_ascii_name() {
        let query = parse_ok("中文");
        check!(query.found_elems == 1);
        check!(!query.literal_search);
        let elem = &query.elems[0];
        check!(elem.name == "中文");
        check!(elem.full_path == vec!["中文"]);
        check!(elem.path_without_last.is_empty());
        check!(elem.type_filter.is_none());
        check!(query.is_name_search());
    }

    #[test]
    fn identifiers_may_start_with_underscore() {
        let query = parse_ok("_0Mixed中英文");
        check!(query.original == "_0Mixed中英文");
        check!(query.user_query == "_0mixed中英文");
        check!(query.elems[0].path_last == "_0mixed中英文");
        check!(query.elems[0].normalized_path_last == "0mixed中英文");
    }

    #[test]
    fn colon_separated_path() {
        let query = parse_ok("my_crate::中文API");
        let elem = &query.elems[0];
        check!(elem.name == "my_crate::中文api");
        check!(elem.full_path == vec!["my_crate", "中文api"]);
        check!(elem.path_without_last == vec!["my_crate"]);
        check!(elem.path_last == "中文api");
    }

    #[test]
    fn space_separated_path_with_macro_suffix() {
        let query = parse_ok("my_crate 中文宏!");
        let elem = &query.elems[0];
        check!(elem.name == "my_crate 中文宏");
        check!(elem.full_path == vec!["my_crate", "中文宏"]);
        check!(elem.path_last == "中文宏");
        check!(elem.type_filter == Some(ItemType::Macro));
        check!(query.user_query == "my_crate 中文宏!");
    }

    #[test]
    fn generics_bindings_and_return_types() {
        let query = parse_ok("类型A,类型B<约束C>->返回类型<关联类型=路径::约束D>");
        check!(query.found_elems == 3);
        check!(query.total_elems == 5);
        check!(query.literal_search);
        check!(query.elems.len() == 2);
        check!(query.elems[0].name == "类型a");
        check!(query.elems[1].name == "类型b");
        check!(query.elems[1].generics.len() == 1);
        check!(query.elems[1].generics[0].name == "约束c");

        let returned = &query.returned[0];
        check!(returned.name == "返回类型");
        check!(returned.generics.is_empty());
        check!(returned.bindings.len() == 1);
        check!(returned.bindings[0].name == "关联类型");
        let constraint = &returned.bindings[0].constraints[0];
        check!(constraint.full_path == vec!["路径", "约束d"]);
        check!(constraint.path_without_last == vec!["路径"]);
    }

    #[test]
    fn invalid_character_reports_predecessor() {
        let query = parse_query("非法符号——");
        check!(query.original == "非法符号——");
        check!(query.user_query == "非法符号——");
        let_assert!(Some(error) = &query.error);
        check!(error.fragments() == ["Unexpected ", "—", " after ", "号", " (not a valid identifier)"]);
        check!(error.to_string() == "Unexpected `—` after `号` (not a valid identifier)");
        check!(query.elems.is_empty());
        check!(query.found_elems == 0);
    }

    #[rstest]
    #[case("fn:foo", ItemType::Function)]
    #[case("const:max", ItemType::Constant)]
    #[case("macro:vec!", ItemType::Macro)]
    #[case("trait : read", ItemType::Trait)]
    #[case("primitive:!", ItemType::Primitive)]
    fn type_filters(#[case] input: &str, #[case] expected: ItemType) {
        let query = parse_ok(input);
        check!(query.elems.len() == 1);
        check!(query.elems[0].type_filter == Some(expected));
        check!(query.total_elems <= 1);
    }

    #[rstest]
    #[case("foo:bar", &["Unknown type filter ", "foo"])]
    #[case("fn:foo!", &["Invalid search type: macro ", "!", " and ", "fn", " both specified"])]
    #[case("vec<u8", &["Unclosed ", "<"])]
    #[case("[u8", &["Unclosed ", "["])]
    #[case("u8 ->", &["Expected at least one item after ", "->"])]
    #[case("fn() ->", &["Expected at least one item after ", "->"])]
    #[case("a=b", &["Type parameter ", "=", " must be within generics list"])]
    #[case("vec::", &["Paths cannot end with ", "::"])]
    #[case("::vec", &["Paths cannot start with ", "::"])]
    #[case("a::::b", &["Unexpected ", "::::"])]
    #[case("\"\"", &["Cannot have empty string element"])]
    #[case("\"vec", &["Unclosed ", "\""])]
    #[case("\"vec\" u8", &["Cannot have more than one element if you use quotes"])]
    #[case("<u8>", &["Found generics without a path"])]
    #[case("a b<c> d", &["Expected ", ",", ", ", ":", " or ", "->", " after ", ">", ", found ", "d"])]
    #[case("a -b", &["Unexpected ", "-", " (did you mean ", "->", "?)"])]
    #[case(":a", &["Expected type filter before ", ":"])]
    #[case("fn:", &["Unexpected ", ":", " (expected path after type filter ", "fn:", ")"])]
    #[case("foo!bar", &["Unexpected ", "!", ": it can only be at the end of an ident"])]
    #[case("!<u8>", &["Never type ", "!", " does not accept generic parameters"])]
    #[case("vec<!=u8>", &["Type parameter ", "=", " key cannot be ", "!", " never type"])]
    #[case("(a=b)", &["Type parameter ", "=", " cannot be within tuple ", "()"])]
    #[case("(a -> b=c)", &["Unexpected ", "=", " within ", "->"])]
    fn syntax_errors(#[case] input: &str, #[case] expected: &[&str]) {
        check!(fragments(input) == expected);
    }

    #[test]
    fn quoted_search_is_literal() {
        let query = parse_ok("\"Vec\"");
        check!(query.literal_search);
        check!(query.original == "\"Vec\"");
        check!(query.elems[0].name == "vec");
    }

    #[test]
    fn multiple_elements_switch_to_literal_search() {
        let query = parse_ok("a, b");
        check!(query.literal_search);
        check!(query.found_elems == 2);
    }

    #[test]
    fn ml_style_function_arrow() {
        let query = parse_ok("option<t>, (t -> u) -> option<u>");
        check!(query.elems.len() == 2);
        let hof = &query.elems[1];
        check!(hof.name == "->");
        check!(hof.type_filter.is_none());
        check!(hof.generics.len() == 1);
        check!(hof.generics[0].name == "t");
        check!(hof.bindings[0].name == "output");
        check!(hof.bindings[0].constraints[0].name == "u");
        check!(query.returned[0].name == "option");
    }

    #[test]
    fn closure_syntax_stores_output_binding() {
        let query = parse_ok("fnonce(a, b) -> c");
        let elem = &query.elems[0];
        check!(elem.name == "fnonce");
        check!(elem.generics.iter().map(|g| g.name.as_str()).collect::<Vec<_>>() == vec!["a", "b"]);
        check!(elem.bindings.len() == 1);
        check!(elem.bindings[0].constraints[0].name == "c");

        let no_output = parse_ok("fn(a)");
        check!(no_output.elems[0].generics.len() == 1);
        check!(no_output.elems[0].bindings[0].name == "output");
        check!(no_output.elems[0].bindings[0].constraints.is_empty());
    }

    #[test]
    fn references_and_never() {
        let query = parse_ok("&mut vec");
        let elem = &query.elems[0];
        check!(elem.name == "reference");
        check!(elem.type_filter == Some(ItemType::Primitive));
        check!(elem.generics[0].name == "mut");
        check!(elem.generics[0].type_filter == Some(ItemType::Keyword));
        check!(elem.generics[1].name == "vec");

        let never = parse_ok("!");
        check!(never.elems[0].name == "never");
        check!(never.elems[0].type_filter == Some(ItemType::Primitive));
    }

    #[test]
    fn bindings_after_reference_attach_to_the_reference() {
        let query = parse_ok("iterator<item=&u8>");
        let elem = &query.elems[0];
        check!(elem.generics.is_empty());
        check!(elem.bindings[0].name == "item");
        check!(elem.bindings[0].constraints[0].name == "reference");
    }

    #[test]
    fn tuples_and_slices() {
        let query = parse_ok("(u8, u16), [u8]");
        check!(query.elems[0].name == "()");
        check!(query.elems[0].generics.len() == 2);
        check!(query.elems[1].name == "[]");
        check!(query.elems[1].type_filter == Some(ItemType::Primitive));

        let unwrapped = parse_ok("(u8)");
        check!(unwrapped.elems[0].name == "u8");
    }

    #[test]
    fn return_only_query() {
        let query = parse_ok("-> u8");
        check!(query.elems.is_empty());
        check!(query.returned.len() == 1);
        check!(query.found_elems == 1);
        check!(!query.is_name_search());
    }

    #[test]
    fn whitespace_controls_become_spaces() {
        let query = parse_ok("  vec\tu8\n");
        check!(query.original == "vec u8");
        check!(query.elems[0].full_path == vec!["vec", "u8"]);
    }

    #[rstest]
    #[case("vec")]
    #[case("std::vec::Vec<u8>")]
    #[case("option<t>, (t -> u) -> option<u>")]
    #[case("iterator<item=u32> -> u32")]
    #[case("fn:foo, bar")]
    #[case("非法符号——")]
    #[case("vec<u8")]
    fn parsing_is_deterministic(#[case] input: &str) {
        check!(parse_query(input) == parse_query(input));
    }

    #[rstest]
    #[case("vec")]
    #[case("a, b -> c")]
    #[case("struct:vec<u8>, &str")]
    #[case("-> ()")]
    #[case("fn(a) -> b")]
    fn found_elements_count_top_level(#[case] input: &str) {
        let query = parse_ok(input);
        check!(query.found_elems == query.elems.len() + query.returned.len());
        check!(query.total_elems >= query.found_elems);
    }
}
