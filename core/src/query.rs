use serde::{Deserialize, Serialize};

/// Whether the search surface currently has an active search context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// No active search; every input yields "no query".
    #[default]
    General,
    /// Snippet insertion: input is split into fuzzy and filter terms.
    Insert,
}

/// Raw input split into the name term and the content term.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitQuery {
    pub fuzzy: String,
    /// Empty when the input holds a single word.
    pub filter: String,
}

/// Split `raw` on the first run of whitespace.
///
/// Returns `None` ("no query") in `General` mode or when the input has no
/// fuzzy term at all.
pub fn split_query(mode: SearchMode, raw: &str) -> Option<SplitQuery> {
    if mode == SearchMode::General {
        return None;
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (fuzzy, filter) = match trimmed.split_once(char::is_whitespace) {
        Some((fuzzy, rest)) => (fuzzy, rest.trim()),
        None => (trimmed, ""),
    };

    Some(SplitQuery {
        fuzzy: fuzzy.to_string(),
        filter: filter.to_string(),
    })
}
