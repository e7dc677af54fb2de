//! Query → pattern translation shared by search and delete.
//!
//! Query tokens are used as regex source verbatim, so users can type regex
//! syntax. A query that does not compile degrades to a case-insensitive
//! literal substring match instead of failing.

use regex::Regex;
use tracing::debug;

const SEPARATORS: &str = r"[\.\+\-_]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMode {
    /// Empty query, matches any non-empty name.
    Any,
    /// Single token bounded by word boundaries or separators.
    Token,
    /// Several tokens in order, each preceded by a separator.
    Sequence,
    /// The built regex did not compile; the raw query is matched literally.
    Literal,
}

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    /// Lowercased needle for a substring test.
    Literal(String),
}

/// A compiled, case-insensitive search pattern.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    matcher: Matcher,
    mode: PatternMode,
}

impl SearchPattern {
    pub fn build(query: &str) -> Self {
        let query = query.trim();
        let (raw, mode) = if query.is_empty() {
            (".".to_string(), PatternMode::Any)
        } else if !query.contains(' ') {
            (
                format!(r"(\b|{SEPARATORS}){query}(\b|{SEPARATORS})"),
                PatternMode::Token,
            )
        } else {
            (
                query.replace(' ', r".*[\s\.\+\-_]"),
                PatternMode::Sequence,
            )
        };

        // Oversized queries fail here too (size limit), and land in the literal path.
        match Regex::new(&format!("(?i){raw}")) {
            Ok(regex) => Self {
                matcher: Matcher::Regex(regex),
                mode,
            },
            Err(e) => {
                debug!(query_len = query.len(), error = %e, "query is not a usable pattern, matching literally");
                Self {
                    matcher: Matcher::Literal(query.to_lowercase()),
                    mode: PatternMode::Literal,
                }
            }
        }
    }

    pub fn mode(&self) -> PatternMode {
        self.mode
    }

    /// Regex source including the case-insensitivity flag; `None` in literal mode.
    pub fn regex_source(&self) -> Option<&str> {
        match &self.matcher {
            Matcher::Regex(regex) => Some(regex.as_str()),
            Matcher::Literal(_) => None,
        }
    }

    /// Lowercased needle in literal mode.
    pub fn literal(&self) -> Option<&str> {
        match &self.matcher {
            Matcher::Regex(_) => None,
            Matcher::Literal(needle) => Some(needle),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(regex) => regex.is_match(text),
            Matcher::Literal(needle) => contains_ignore_case(text, needle),
        }
    }
}

/// `needle` must already be lowercase.
pub fn contains_ignore_case(text: &str, needle: &str) -> bool {
    text.to_lowercase().contains(needle)
}
