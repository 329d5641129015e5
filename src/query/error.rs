//! Structured query errors.

use std::fmt;

/// A query syntax or resolution error as an ordered list of fragments.
///
/// Even-indexed fragments are prose; odd-indexed fragments quote the query
/// (a character, a keyword, a piece of punctuation) and are meant to be
/// highlighted when displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct QueryError(Vec<String>);

impl QueryError {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fragments.into_iter().map(Into::into).collect())
    }

    pub fn fragments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, fragment) in self.0.iter().enumerate() {
            if i % 2 == 1 {
                write!(f, "`{fragment}`")?;
            } else {
                f.write_str(fragment)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for QueryError {}

/// Builds a [`QueryError`] from fragments of any displayable type.
macro_rules! query_error {
    ($($fragment:expr),+ $(,)?) => {
        $crate::query::QueryError::new([$($fragment.to_string()),+])
    };
}

pub(crate) use query_error;

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn code_fragments_are_backticked() {
        let err = query_error!["Unexpected ", '—', " after ", "号", " (not a valid identifier)"];
        check!(err.to_string() == "Unexpected `—` after `号` (not a valid identifier)");
        check!(err.fragments().len() == 5);
    }

    #[test]
    fn single_fragment_is_plain() {
        let err = QueryError::new(["Cannot have empty string element"]);
        check!(err.to_string() == "Cannot have empty string element");
    }
}
