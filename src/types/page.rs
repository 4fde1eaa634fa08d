//! Page identity and rule types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a page in the link graph.
///
/// Wraps the numeric page id and implements `Ord` for deterministic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(u64);

impl PageId {
    /// Create a new PageId from a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner numeric id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PageId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Error constructing a rule index.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleIndexError {
    /// N must be at least 1.
    #[error("Rule index must be >= 1, got {0}")]
    Zero(u32),
}

/// The rule parameter N: which outgoing link position a page follows.
///
/// Results computed under different rule indices are not comparable except
/// through the multiplex analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleIndex(u32);

impl RuleIndex {
    /// Create a rule index. Fails for N = 0.
    pub fn new(n: u32) -> Result<Self, RuleIndexError> {
        if n == 0 {
            return Err(RuleIndexError::Zero(n));
        }
        Ok(Self(n))
    }

    /// The raw N value.
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Zero-based position into a page's ordered link list.
    pub fn link_position(&self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for RuleIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Reference to a page, either by numeric id or by title.
///
/// Titles are resolved exactly once at the boundary; everything past the
/// boundary works with `PageId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageRef {
    /// Already-resolved numeric id.
    ById(PageId),
    /// Title requiring resolution.
    ByTitle(String),
}

/// Where one application of the rule sends a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Successor {
    /// The page's Nth link target.
    Page(PageId),
    /// The page's link list is shorter than N.
    Halt,
}

impl Successor {
    /// True if this successor is the halt state.
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Halt)
    }

    /// The target page, if any.
    pub fn page(&self) -> Option<PageId> {
        match self {
            Self::Page(p) => Some(*p),
            Self::Halt => None,
        }
    }
}

impl fmt::Display for Successor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(p) => write!(f, "{}", p),
            Self::Halt => write!(f, "HALT"),
        }
    }
}

/// Apply the rule to an ordered link list.
///
/// `succ_N(p) = links(p)[N-1]` when the page has at least N links, `Halt`
/// otherwise. Total over every link list, including the empty one.
pub fn succ_from_links(links: &[PageId], rule: RuleIndex) -> Successor {
    match links.get(rule.link_position()) {
        Some(target) => Successor::Page(*target),
        None => Successor::Halt,
    }
}
