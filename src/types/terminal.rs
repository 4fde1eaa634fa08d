//! Terminal states of the induced map: halt, or a canonicalized cycle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::page::PageId;

/// A terminal cycle, canonicalized by rotating the minimum-valued member to
/// the front.
///
/// Two sequences describing the same loop always canonicalize to the same
/// value, so the cycle key is a stable basin identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalCycle {
    pages: Vec<PageId>,
}

impl CanonicalCycle {
    /// Canonicalize a cycle sequence.
    ///
    /// Returns `None` if the sequence is empty or contains duplicates
    /// (a valid cycle visits each member exactly once).
    pub fn new(pages: Vec<PageId>) -> Option<Self> {
        if pages.is_empty() {
            return None;
        }
        let distinct: BTreeSet<_> = pages.iter().copied().collect();
        if distinct.len() != pages.len() {
            return None;
        }
        let min_pos = pages
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| **p)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let mut rotated = pages;
        rotated.rotate_left(min_pos);
        Some(Self { pages: rotated })
    }

    /// Members in canonical order.
    pub fn members(&self) -> &[PageId] {
        &self.pages
    }

    /// Cycle length.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Cycles are never empty by construction.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Smallest member (the canonical head).
    pub fn min_page(&self) -> PageId {
        self.pages[0]
    }

    /// Membership test.
    pub fn contains(&self, page: PageId) -> bool {
        self.pages.contains(&page)
    }

    /// Stable string key, e.g. `cycle:42-117`.
    pub fn key(&self) -> String {
        let ids: Vec<String> = self.pages.iter().map(|p| p.to_string()).collect();
        format!("cycle:{}", ids.join("-"))
    }
}

impl fmt::Display for CanonicalCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Eventual fate of a page under a fixed rule index.
///
/// Every page has exactly one terminal: basins over a fixed N partition the
/// page set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terminal {
    /// Forward trace ran off the end of a link list.
    Halt,
    /// Forward trace entered a closed loop.
    Cycle(CanonicalCycle),
}

impl Terminal {
    /// True if this terminal is a cycle.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle(_))
    }

    /// The cycle, if any.
    pub fn cycle(&self) -> Option<&CanonicalCycle> {
        match self {
            Self::Cycle(c) => Some(c),
            Self::Halt => None,
        }
    }

    /// Stable basin key: `halt` or the cycle key.
    pub fn basin_key(&self) -> String {
        match self {
            Self::Halt => "halt".to_string(),
            Self::Cycle(c) => c.key(),
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.basin_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: u64) -> PageId {
        PageId::new(id)
    }

    #[test]
    fn test_canonicalization_rotates_to_min() {
        let a = CanonicalCycle::new(vec![p(3), p(1), p(2)]).unwrap();
        let b = CanonicalCycle::new(vec![p(1), p(2), p(3)]).unwrap();
        let c = CanonicalCycle::new(vec![p(2), p(3), p(1)]).unwrap();

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.min_page(), p(1));
        assert_eq!(a.members(), &[p(1), p(2), p(3)]);
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert!(CanonicalCycle::new(vec![]).is_none());
        assert!(CanonicalCycle::new(vec![p(1), p(2), p(1)]).is_none());
    }

    #[test]
    fn test_basin_keys() {
        let cycle = CanonicalCycle::new(vec![p(7), p(4)]).unwrap();
        assert_eq!(cycle.key(), "cycle:4-7");
        assert_eq!(Terminal::Cycle(cycle).basin_key(), "cycle:4-7");
        assert_eq!(Terminal::Halt.basin_key(), "halt");
    }

    #[test]
    fn test_rotation_preserves_order() {
        // Rotation, not sorting: 5 -> 2 -> 9 stays 2 -> 9 -> 5.
        let cycle = CanonicalCycle::new(vec![p(5), p(2), p(9)]).unwrap();
        assert_eq!(cycle.members(), &[p(2), p(9), p(5)]);
    }
}
