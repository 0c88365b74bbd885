//! Collection exclusion by glob pattern.
//!
//! Supports `*` (any run of characters, including none) and `?` (exactly
//! one character). Matching is case-sensitive since collection slugs are.

/// Set of exclusion patterns applied to discovered collection names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionFilter {
    patterns: Vec<String>,
}

impl CollectionFilter {
    /// Creates a filter from raw patterns, dropping blank entries
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// True when no pattern is configured
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True when `name` matches any exclusion pattern
    pub fn is_excluded(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| glob_match(pattern, name))
    }

    /// Splits names into (kept, excluded), preserving order
    pub fn partition(&self, names: Vec<String>) -> (Vec<String>, Vec<String>) {
        names.into_iter().partition(|name| !self.is_excluded(name))
    }
}

/// Matches `text` against a glob `pattern`.
///
/// Iterative matcher that remembers the most recent `*` and retries from
/// there on mismatch, so it runs in O(pattern × text) without recursion.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < text.len() {
        match pattern.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some('?') => {
                pi += 1;
                ti += 1;
            }
            Some(&c) if c == text[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match backtrack {
                Some((star_pi, star_ti)) => {
                    pi = star_pi + 1;
                    ti = star_ti + 1;
                    backtrack = Some((star_pi, star_ti + 1));
                }
                None => return false,
            },
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}
