//! Page-walk results and continuation rule.

use crate::models::Page;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a page walk stopped before the server reported the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    /// 1-based number of the page whose request failed
    pub failed_page: u64,
    /// Redacted error message of the failed request
    pub error: String,
}

impl std::fmt::Display for Truncation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {} failed: {}", self.failed_page, self.error)
    }
}

/// Documents accumulated by a sequential page walk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginatedData {
    /// Documents in page order
    pub docs: Vec<Value>,
    /// Pages that returned successfully
    pub pages_fetched: u64,
    /// Set when a page request failed and the walk stopped early
    pub truncation: Option<Truncation>,
}

impl PaginatedData {
    /// True when the walk stopped on a failed page
    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }

    /// Number of accumulated documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// True when no document was accumulated
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Whether another page should be requested after `page` (number `current`).
///
/// Stops on an empty page. Otherwise continues if the server says there is
/// a next page, or if it points at a page number beyond the current one.
pub fn has_more(page: &Page, current: u64) -> bool {
    if page.docs.is_empty() {
        return false;
    }
    page.has_next_page || page.next_page.is_some_and(|next| next > current)
}
